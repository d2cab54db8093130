//! Cached bearer token and the identity endpoint wire types.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Deserialize;

/// Buffer subtracted from the token lifetime; a token within this
/// window of expiry is treated as already expired so in-flight
/// requests never present a token about to lapse.
pub const REFRESH_BUFFER: Duration = Duration::from_secs(60);

/// Lifetime assumed when the identity endpoint omits `expires_in`.
/// Insights tokens are issued with a fixed 15 minute lifetime.
pub(crate) const DEFAULT_LIFETIME_SECS: u64 = 900;

/// A cached bearer token.
///
/// Replaced wholesale on refresh, never mutated. The token value is
/// redacted in Debug output.
#[derive(Clone)]
pub struct Token {
    value: String,
    obtained_at: Instant,
    expires_at: Instant,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("value", &"[REDACTED]")
            .field("obtained_at", &self.obtained_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl Token {
    pub(crate) fn new(value: String, lifetime: Duration) -> Self {
        let obtained_at = Instant::now();
        Self {
            value,
            obtained_at,
            expires_at: obtained_at + lifetime,
        }
    }

    /// The opaque bearer value presented in the Authorization header.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// When this token was acquired.
    pub fn obtained_at(&self) -> Instant {
        self.obtained_at
    }

    /// When this token expires.
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Returns true while the token is usable, i.e. `now` is earlier
    /// than `expires_at` minus the refresh buffer.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Instant::now())
    }

    pub(crate) fn is_valid_at(&self, now: Instant) -> bool {
        match self.expires_at.checked_sub(REFRESH_BUFFER) {
            Some(deadline) => now < deadline,
            None => false,
        }
    }
}

/// Wire response from the identity endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    #[allow(dead_code)]
    pub token_type: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    #[serde(default)]
    #[allow(dead_code)]
    pub scope: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

fn default_expires_in() -> u64 {
    DEFAULT_LIFETIME_SECS
}

/// Wire error response from the identity endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct IdentityErrorResponse {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_validity_window() {
        let token = Token::new("tok".to_string(), Duration::from_secs(900));
        assert!(token.is_valid());

        // A token whose remaining lifetime is inside the refresh
        // buffer counts as expired.
        let short = Token::new("tok".to_string(), Duration::from_secs(30));
        assert!(!short.is_valid());

        let zero = Token::new("tok".to_string(), Duration::ZERO);
        assert!(!zero.is_valid());
    }

    #[test]
    fn test_token_debug_redacts_value() {
        let token = Token::new("very_secret_bearer".to_string(), Duration::from_secs(900));
        let debug_output = format!("{token:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("very_secret_bearer"));
    }

    #[test]
    fn test_token_response_defaults() {
        let resp: TokenResponse =
            serde_json::from_str(r#"{"access_token": "abc"}"#).unwrap();
        assert_eq!(resp.access_token, "abc");
        assert_eq!(resp.token_type, "Bearer");
        assert_eq!(resp.expires_in, 900);
        assert_eq!(resp.scope, "");
    }

    #[test]
    fn test_token_response_full() {
        let resp: TokenResponse = serde_json::from_str(
            r#"{"access_token": "abc", "token_type": "Bearer", "expires_in": 600, "scope": "tsg_id:1"}"#,
        )
        .unwrap();
        assert_eq!(resp.expires_in, 600);
        assert_eq!(resp.scope, "tsg_id:1");
    }
}
