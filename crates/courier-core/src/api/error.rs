use std::fmt;

use serde_json::Value;

/// Categories of API failures for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Transport failed: unreachable host, refused connection, timeout
    Network,
    /// The server answered with a non-2xx status
    HttpStatus,
    /// A response body did not match the wire contract
    Deserialization,
    /// A request body could not be serialized; nothing was sent
    Encoding,
    /// The owning task went away before the response arrived
    Cancelled,
    /// Rotated tokens could not be written to the session store
    Persistence,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Network => write!(f, "network"),
            ApiErrorKind::HttpStatus => write!(f, "http_status"),
            ApiErrorKind::Deserialization => write!(f, "deserialization"),
            ApiErrorKind::Encoding => write!(f, "encoding"),
            ApiErrorKind::Cancelled => write!(f, "cancelled"),
            ApiErrorKind::Persistence => write!(f, "persistence"),
        }
    }
}

/// Structured error from the backend pipeline with kind and details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// Error category
    pub kind: ApiErrorKind,
    /// HTTP status code, for `HttpStatus` errors
    pub status: Option<u16>,
    /// One-line summary suitable for display
    pub message: String,
    /// Optional additional details (e.g., raw error body)
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            details: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Network, message)
    }

    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Deserialization, message)
    }

    pub fn encoding(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Encoding, message)
    }

    pub fn cancelled() -> Self {
        Self::new(ApiErrorKind::Cancelled, "Request cancelled")
    }

    /// Creates an HTTP status error, pulling a readable message out of JSON bodies.
    pub fn http_status(status: u16, body: &str) -> Self {
        let details = (!body.is_empty()).then(|| body.to_string());
        let message = match extract_message(body) {
            Some(msg) => format!("HTTP {status}: {msg}"),
            None => format!("HTTP {status}"),
        };
        Self {
            kind: ApiErrorKind::HttpStatus,
            status: Some(status),
            message,
            details,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// True for a 401 answer, the only status the refresh policy reacts to.
    pub fn is_unauthorized(&self) -> bool {
        self.kind == ApiErrorKind::HttpStatus && self.status == Some(401)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Accepts `{"message": ..}`, `{"error": {"message": ..}}` and `{"error": ".."}`.
fn extract_message(body: &str) -> Option<String> {
    let json = serde_json::from_str::<Value>(body).ok()?;
    let msg = json
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| {
            let error = json.get("error")?;
            error
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| error.as_str())
        })?;
    Some(msg.to_string())
}

/// Classifies a reqwest error into an `ApiError`.
pub(crate) fn classify_reqwest_error(e: &reqwest::Error) -> ApiError {
    if e.is_decode() {
        ApiError::deserialization(format!("Failed to decode response: {e}"))
    } else if e.is_timeout() {
        ApiError::network(format!("Request timed out: {e}"))
    } else if e.is_connect() {
        ApiError::network(format!("Connection failed: {e}"))
    } else if e.is_request() {
        ApiError::network(format!("Request error: {e}"))
    } else {
        ApiError::network(format!("Network error: {e}"))
    }
}
