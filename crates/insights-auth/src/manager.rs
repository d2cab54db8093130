//! Token acquisition and caching with single-flight refresh.

use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::credentials::InsightsCredentials;
use crate::error::{Error, ErrorKind, Result};
use crate::token::{IdentityErrorResponse, Token, TokenResponse};

/// Default identity endpoint for Prisma Access APIs.
pub const DEFAULT_AUTH_URL: &str = "https://auth.apps.paloaltonetworks.com/oauth2/access_token";

/// Default timeout for a single identity-endpoint call. Acquisition is
/// never retried inside the manager, so this bounds the whole call.
pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);

/// Acquires and caches bearer tokens for the Insights API.
///
/// One manager instance is shared by every request path of a client
/// instance. The cached token lives behind a single async mutex; the
/// caller that finds the cache stale performs the acquisition while
/// holding the lock, so concurrent callers collapse onto one
/// identity-endpoint call and all receive the token it produced
/// (single-flight).
///
/// Acquisition failures are classified but never retried here; retry
/// policy belongs to the request execution layer so it lives in
/// exactly one place.
pub struct TokenManager {
    credentials: InsightsCredentials,
    auth_url: String,
    timeout: Duration,
    http: reqwest::Client,
    cached: Mutex<Option<Token>>,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("credentials", &self.credentials)
            .field("auth_url", &self.auth_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Create a manager using the default identity endpoint.
    pub fn new(credentials: InsightsCredentials, http: reqwest::Client) -> Self {
        Self::with_auth_url(credentials, http, DEFAULT_AUTH_URL)
    }

    /// Create a manager against a custom identity endpoint.
    pub fn with_auth_url(
        credentials: InsightsCredentials,
        http: reqwest::Client,
        auth_url: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            auth_url: auth_url.into(),
            timeout: DEFAULT_AUTH_TIMEOUT,
            http,
            cached: Mutex::new(None),
        }
    }

    /// Set the per-acquisition timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The identity endpoint in use.
    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    /// Return a valid token, acquiring a fresh one when the cache is
    /// empty or inside the refresh buffer.
    ///
    /// Callable concurrently: the lock is held across the acquisition,
    /// so later arrivals wait for the in-flight call and then find the
    /// fresh token on their own validity re-check.
    pub async fn get_valid_token(&self) -> Result<Token> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_valid() {
                return Ok(token.clone());
            }
        }

        let token = self.acquire().await?;
        *cached = Some(token.clone());
        Ok(token)
    }

    /// Drop the cached token if it still matches `stale_value`, forcing
    /// the next `get_valid_token` to reacquire.
    ///
    /// The compare-and-clear keeps two concurrent callers that both saw
    /// a 401 with the same token from invalidating each other's
    /// replacement: whichever arrives second finds the cache already
    /// holding a different token and leaves it alone.
    pub async fn invalidate(&self, stale_value: &str) {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.value() == stale_value {
                debug!("invalidating cached token");
                *cached = None;
            }
        }
    }

    /// Perform one identity-endpoint call. Not retried here.
    #[instrument(skip(self), fields(auth_url = %self.auth_url))]
    async fn acquire(&self) -> Result<Token> {
        let scope = self.credentials.scope();
        let body = serde_urlencoded::to_string([
            ("grant_type", "client_credentials"),
            ("scope", scope.as_str()),
        ])?;

        let response = self
            .http
            .post(&self.auth_url)
            .basic_auth(
                self.credentials.client_id(),
                Some(self.credentials.client_secret()),
            )
            .header("Content-Type", "application/x-www-form-urlencoded")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();

        if status == 400 || status == 401 || status == 403 {
            // Credential rejection is terminal; decode the OAuth error
            // body for diagnostics but never echo credentials.
            let error: IdentityErrorResponse = response.json().await.unwrap_or_else(|_| {
                IdentityErrorResponse {
                    error: "invalid_client".to_string(),
                    error_description: format!("identity endpoint returned HTTP {status}"),
                }
            });
            warn!(error = %error.error, "identity provider rejected credentials");
            return Err(Error::new(ErrorKind::Rejected {
                error: error.error,
                description: error.error_description,
            }));
        }

        if !response.status().is_success() {
            return Err(Error::new(ErrorKind::Http { status }));
        }

        let wire: TokenResponse = response.json().await?;
        debug!(expires_in = wire.expires_in, "acquired bearer token");

        Ok(Token::new(
            wire.access_token,
            Duration::from_secs(wire.expires_in),
        ))
    }
}
