//! # strata-insights-auth
//!
//! Authentication for the Prisma Access Insights API: OAuth2
//! client-credentials acquisition, token caching with a refresh
//! buffer, and single-flight refresh under concurrent callers.
//!
//! ## Security
//!
//! - Client secrets and token values are redacted in Debug output
//! - Tracing spans skip credential parameters
//! - Error messages never carry credential material
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_insights_auth::{InsightsCredentials, TokenManager};
//!
//! let creds = InsightsCredentials::new(client_id, client_secret, tsg_id)?;
//! let manager = TokenManager::new(creds, reqwest::Client::new());
//!
//! let token = manager.get_valid_token().await?;
//! ```

mod credentials;
mod error;
mod manager;
mod token;

pub use credentials::{InsightsCredentials, Region};
pub use error::{Error, ErrorKind, Result};
pub use manager::{TokenManager, DEFAULT_AUTH_TIMEOUT, DEFAULT_AUTH_URL};
pub use token::{Token, REFRESH_BUFFER};
