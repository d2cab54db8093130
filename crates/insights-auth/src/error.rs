//! Error types for insights-auth.
//!
//! Error messages are designed to avoid exposing credential material.

/// Result type alias for insights-auth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for insights-auth operations.
///
/// Error messages are sanitized to prevent accidental credential exposure.
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

    /// Returns true if this failure is transient and worth retrying at
    /// the request layer. The token manager itself never retries; the
    /// classification lets the caller's retry executor govern policy.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Returns true if the identity provider rejected the credentials.
    pub fn is_rejection(&self) -> bool {
        matches!(self.kind, ErrorKind::Rejected { .. })
    }
}

/// The kind of error that occurred.
///
/// Error messages avoid including credential values.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Invalid credential or region configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The identity endpoint rejected the credentials (non-retryable).
    #[error("Identity provider rejected credentials: {error} - {description}")]
    Rejected { error: String, description: String },

    /// Non-2xx response from the identity endpoint.
    #[error("Identity endpoint error: HTTP {status}")]
    Http { status: u16 },

    /// Timeout talking to the identity endpoint.
    #[error("Identity endpoint timeout")]
    Timeout,

    /// Connection failure talking to the identity endpoint.
    #[error("Identity endpoint connection error: {0}")]
    Connection(String),

    /// Malformed token response.
    #[error("Token response decode error: {0}")]
    Json(String),

    /// Form serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ErrorKind {
    /// Returns true if this error kind is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ErrorKind::Timeout | ErrorKind::Connection(_) => true,
            ErrorKind::Http { status } => matches!(status, 429 | 500 | 502 | 503 | 504),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Sanitize the message so neither tokens nor secrets end up in logs.
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_connect() {
            ErrorKind::Connection("connection failed".to_string())
        } else if let Some(status) = err.status() {
            ErrorKind::Http {
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            ErrorKind::Json("response decode failed".to_string())
        } else {
            ErrorKind::Connection("request failed".to_string())
        };

        Error::with_source(kind, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<serde_urlencoded::ser::Error> for Error {
    fn from(err: serde_urlencoded::ser::Error) -> Self {
        Error::with_source(ErrorKind::Serialization(err.to_string()), err)
    }
}
