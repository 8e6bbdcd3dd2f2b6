//! Error taxonomy for analysis and health-check calls.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, AnalysisError>;

/// Errors surfaced by [`crate::AnalysisClient`] and request validation.
#[derive(Debug, Clone, Error)]
pub enum AnalysisError {
    /// Bad or empty input. Callers are expected to catch this before calling.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Transport failure (connection refused, DNS, TLS, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// Backend answered with a non-2xx status.
    #[error("HTTP {status_code}: {status_text}")]
    Http { status_code: u16, status_text: String },

    /// The exchange did not finish within the absolute budget.
    #[error("Request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Response body was not the JSON we expected.
    #[error("Failed to parse response: {0}")]
    Parse(String),

    /// Backend returned a 2xx envelope carrying an explicit error message.
    #[error("Backend reported an error: {0}")]
    BackendReported(String),

    /// The caller fired the cancellation token.
    #[error("Request cancelled")]
    Cancelled,

    /// The underlying HTTP client could not be built.
    #[error("Failed to create HTTP client: {0}")]
    ClientInit(String),
}

/// Discriminant of [`AnalysisError`] for callers that branch on the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Network,
    Http,
    Timeout,
    Parse,
    BackendReported,
    Cancelled,
    ClientInit,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::Network => "network_error",
            Self::Http => "http_error",
            Self::Timeout => "timeout",
            Self::Parse => "parse_error",
            Self::BackendReported => "backend_reported_error",
            Self::Cancelled => "cancelled",
            Self::ClientInit => "client_init_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Network(_) => ErrorKind::Network,
            Self::Http { .. } => ErrorKind::Http,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Parse(_) => ErrorKind::Parse,
            Self::BackendReported(_) => ErrorKind::BackendReported,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::ClientInit(_) => ErrorKind::ClientInit,
        }
    }

    /// Whether this failure means the backend is unreachable, which callers
    /// use to move their connectivity state to disconnected.
    pub fn is_connectivity_loss(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout { .. })
    }

    /// Status code for HTTP failures.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Build an HTTP error from a response status.
    pub(crate) fn from_status(status: reqwest::StatusCode) -> Self {
        Self::Http {
            status_code: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }

    /// Classify a reqwest failure raised while sending or reading a response.
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
