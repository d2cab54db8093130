//! # strata-insights
//!
//! A Prisma Access Insights 3.0 API client library for Rust.
//!
//! This library provides access to the Insights query endpoints with
//! built-in OAuth2 token management, retry logic, and error handling.
//!
//! ## Security
//!
//! This library is designed with security in mind:
//! - Sensitive data (tokens, secrets) are redacted in Debug output
//! - Tracing/logging skips credential parameters
//! - Error messages sanitize any credential data
//!
//! ## Crates
//!
//! - **strata-insights-auth** - OAuth2 client-credentials grant, token caching and single-flight refresh
//! - **strata-insights-client** - Query client: endpoint-class body building, retry with backoff, concurrent fan-out
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use strata_insights::{EndpointClass, InsightsClient, InsightsCredentials, Region, TimeWindow};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let creds = InsightsCredentials::new(
//!         std::env::var("INSIGHTS_CLIENT_ID")?,
//!         std::env::var("INSIGHTS_CLIENT_SECRET")?,
//!         std::env::var("INSIGHTS_TSG_ID")?,
//!     )?;
//!
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
//!     for row in &users.data {
//!         println!("{}", row["username"]);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Re-export member crates for convenient access
#[cfg(feature = "auth")]
pub use strata_insights_auth as auth;
#[cfg(feature = "client")]
pub use strata_insights_client as client;

// Re-export commonly used types at the top level
#[cfg(feature = "auth")]
pub use strata_insights_auth::{InsightsCredentials, Region, TokenManager};
#[cfg(feature = "client")]
pub use strata_insights_client::{
    ClientConfig, EndpointClass, FilterRule, InsightsClient, Operator, QueryCall, ResponseEnvelope,
    RetryConfig, TimeWindow,
};
