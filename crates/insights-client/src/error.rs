//! Error taxonomy for insights-client.
//!
//! Classification happens once, at the request execution boundary:
//! every failure is mapped into one of these kinds and the retry loop
//! consults `is_retryable`/`is_auth_error` instead of re-deriving the
//! meaning of a status code at each call site.

use std::time::Duration;

/// Result type alias for insights-client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for insights-client operations.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if this error is retryable under the generic
    /// retry budget.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns true if this is a rate limit error (HTTP 429).
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.kind, ErrorKind::RateLimited { .. })
    }

    /// Returns true if this is an authentication failure (HTTP 401 or
    /// identity-provider rejection).
    pub fn is_auth_error(&self) -> bool {
        matches!(self.kind, ErrorKind::Authentication(_))
    }

    /// Returns the server-specified retry-after duration, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match &self.kind {
            ErrorKind::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// The HTTP status observed, when the failure carries one.
    pub fn status(&self) -> Option<u16> {
        match &self.kind {
            ErrorKind::RateLimited { .. } => Some(429),
            ErrorKind::Http { status, .. } => Some(*status),
            ErrorKind::Api { status, .. } => Some(*status),
            ErrorKind::RetriesExhausted { last_status, .. } => *last_status,
            _ => None,
        }
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Invalid configuration (credentials, region, URLs); raised at
    /// construction, before any network use.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A query is missing an endpoint-mandated filter or is otherwise
    /// malformed; raised by the query builder before any network call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Identity endpoint rejected the credentials, or a query call
    /// returned 401 twice (before and after a forced token refresh).
    /// Terminal; never retried further.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Non-retryable 4xx (other than 429) with the decoded error body.
    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    /// Rate limit exceeded (HTTP 429).
    #[error("Rate limited{}", retry_after.map(|d| format!(", retry after {d:?}")).unwrap_or_default())]
    RateLimited { retry_after: Option<Duration> },

    /// Retryable server error (5xx).
    #[error("HTTP error: {status} {message}")]
    Http { status: u16, message: String },

    /// Per-call deadline exceeded.
    #[error("Request timeout")]
    Timeout,

    /// Connection failure.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Response body decode failure.
    #[error("JSON error: {0}")]
    Json(String),

    /// Retry budget exhausted on a retryable classification; carries
    /// the last observed status and message for diagnostics.
    #[error("All {attempts} retry attempts exhausted{}: {message}", last_status.map(|s| format!(" (last status {s})")).unwrap_or_default())]
    RetriesExhausted {
        attempts: u32,
        last_status: Option<u16>,
        message: String,
    },
}

impl ErrorKind {
    /// Returns true if this error kind is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::RateLimited { .. } => true,
            ErrorKind::Timeout => true,
            ErrorKind::Connection(_) => true,
            ErrorKind::Http { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Retryable status codes: 429 plus the transient 5xx family.
pub(crate) fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() {
            ErrorKind::Connection(err.to_string())
        } else if err.is_decode() {
            ErrorKind::Json(err.to_string())
        } else if let Some(status) = err.status() {
            ErrorKind::Http {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            ErrorKind::Connection(err.to_string())
        };

        Error::with_source(kind, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(ErrorKind::Config(format!("invalid URL: {err}")), err)
    }
}

impl From<strata_insights_auth::Error> for Error {
    fn from(err: strata_insights_auth::Error) -> Self {
        use strata_insights_auth::ErrorKind as AuthKind;

        let kind = match &err.kind {
            AuthKind::Config(msg) => ErrorKind::Config(msg.clone()),
            AuthKind::Rejected { error, description } => {
                ErrorKind::Authentication(format!("{error}: {description}"))
            }
            AuthKind::Http { status } if *status == 429 => {
                ErrorKind::RateLimited { retry_after: None }
            }
            AuthKind::Http { status } => ErrorKind::Http {
                status: *status,
                message: "identity endpoint error".to_string(),
            },
            AuthKind::Timeout => ErrorKind::Timeout,
            AuthKind::Connection(msg) => ErrorKind::Connection(msg.clone()),
            AuthKind::Json(msg) => ErrorKind::Json(msg.clone()),
            AuthKind::Serialization(msg) => ErrorKind::Validation(msg.clone()),
        };

        Error::with_source(kind, err)
    }
}
