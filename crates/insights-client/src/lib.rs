//! # strata-insights-client
//!
//! HTTP client for the Prisma Access Insights query API.
//!
//! This crate provides the query client with:
//! - Automatic retry with exponential backoff and jitter
//! - Rate limit detection with Retry-After handling
//! - Transparent bearer-token management with single-flight refresh
//! - Endpoint-class aware query body building
//! - Connection pooling and concurrent fan-out
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! │  (call / search / call_many over endpoint paths)            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    InsightsClient                           │
//! │  - Builds query bodies per endpoint class                   │
//! │  - Holds TokenManager + pooled HTTP client                  │
//! │  - Retry loop with 401 forced-refresh handling              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    TokenManager                             │
//! │  - OAuth2 client-credentials grant                          │
//! │  - Cached token, single-flight reacquisition                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_insights_auth::{InsightsCredentials, Region};
//! use strata_insights_client::{EndpointClass, InsightsClient, TimeWindow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), strata_insights_client::Error> {
//!     let creds = InsightsCredentials::new(client_id, client_secret, tsg_id)?;
//!     let client = InsightsClient::new(creds, Region::Americas)?;
//!
//!     let users = client
//!         .call(
//!             "query/users/agent/user_list",
//!             TimeWindow::LastHours(24),
//!             &[],
//!             EndpointClass::AgentUser,
//!         )
//!         .await?;
//!
//!     println!("{} rows", users.len());
//!     Ok(())
//! }
//! ```

pub mod blocking;
mod client;
mod config;
mod error;
mod query;
mod response;
mod retry;

pub use client::{InsightsClient, QueryCall};
pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_BASE_URL};
pub use error::{Error, ErrorKind, Result};
pub use query::{
    build_query, Bucket, EndpointClass, FilterRule, FilterValue, HistogramConfig, Operator,
    QueryRequest, TimeWindow, DEFAULT_PLATFORM_TYPES, TIME_PROPERTY,
};
pub use response::{EnvelopeHeader, ResponseEnvelope};
pub use retry::{BackoffStrategy, RetryConfig, RetryPolicy};

pub use strata_insights_auth::{InsightsCredentials, Region};

/// Path prefix shared by every query endpoint.
pub const API_PREFIX: &str = "insights/v3.0/resource";

/// User-Agent string for the client
pub const USER_AGENT: &str = concat!("strata-insights/", env!("CARGO_PKG_VERSION"));
