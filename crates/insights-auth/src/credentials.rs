//! Credentials and region selection.
//!
//! All credential types implement custom Debug to redact sensitive data.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// OAuth2 client-credentials identity for the Insights API.
///
/// All three fields are required and validated non-empty at
/// construction; the struct is immutable afterwards. `client_secret`
/// is redacted in Debug output to prevent accidental exposure in logs.
#[derive(Clone)]
pub struct InsightsCredentials {
    client_id: String,
    client_secret: String,
    tsg_id: String,
}

impl fmt::Debug for InsightsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsightsCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("tsg_id", &self.tsg_id)
            .finish()
    }
}

impl InsightsCredentials {
    /// Create new credentials, failing fast when any field is empty.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tsg_id: impl Into<String>,
    ) -> Result<Self> {
        let creds = Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            tsg_id: tsg_id.into(),
        };

        if creds.client_id.is_empty() {
            return Err(Error::new(ErrorKind::Config(
                "client_id must not be empty".to_string(),
            )));
        }
        if creds.client_secret.is_empty() {
            return Err(Error::new(ErrorKind::Config(
                "client_secret must not be empty".to_string(),
            )));
        }
        if creds.tsg_id.is_empty() {
            return Err(Error::new(ErrorKind::Config(
                "tsg_id must not be empty".to_string(),
            )));
        }

        Ok(creds)
    }

    /// OAuth2 client ID (service account email).
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// OAuth2 client secret (for internal use by the token manager).
    pub(crate) fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Tenant Service Group ID.
    pub fn tsg_id(&self) -> &str {
        &self.tsg_id
    }

    /// OAuth2 scope string requested at the identity endpoint.
    pub fn scope(&self) -> String {
        format!("tsg_id:{}", self.tsg_id)
    }
}

/// Geographic API deployment selector.
///
/// Determines the `X-PANW-Region` header attached to every query
/// request. Unknown region strings fail at parse time, never at
/// request time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    #[default]
    Americas,
    Europe,
    Asia,
    Apac,
}

impl Region {
    /// The wire value used for the `X-PANW-Region` header.
    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Americas => "americas",
            Region::Europe => "europe",
            Region::Asia => "asia",
            Region::Apac => "apac",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "americas" => Ok(Region::Americas),
            "europe" => Ok(Region::Europe),
            "asia" => Ok(Region::Asia),
            "apac" => Ok(Region::Apac),
            other => Err(Error::new(ErrorKind::Config(format!(
                "unknown region '{other}' (expected americas, europe, asia, or apac)"
            )))),
        }
    }
}
