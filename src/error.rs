// Client Error Types
use thiserror::Error;

/// Errors surfaced by the dashboard client library.
///
/// The interceptor and the session service never return these outward; they
/// degrade to a safe state instead. Everything else (storage, HTTP, routing)
/// propagates with `?`.
#[derive(Debug, Error)]
pub enum ClientError {
    // 401 Unauthorized - never retried, status kept for the caller
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // 403 Forbidden
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Any other non-success status from the backend
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed persisted {key}: {reason}")]
    MalformedState { key: String, reason: String },

    #[error("Route not found: {0}")]
    RouteNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// HTTP status associated with the error, when one exists
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized(_) => Some(401),
            ClientError::Forbidden(_) => Some(403),
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Stable error code for JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            ClientError::Unauthorized(_) => "UNAUTHORIZED",
            ClientError::Forbidden(_) => "FORBIDDEN",
            ClientError::Api { .. } => "API_ERROR",
            ClientError::Timeout(_) => "TIMEOUT",
            ClientError::Http(_) => "NETWORK_ERROR",
            ClientError::InvalidUrl(_) => "INVALID_URL",
            ClientError::InvalidHeader(_) => "INVALID_HEADER",
            ClientError::Storage(_) => "STORAGE_ERROR",
            ClientError::Json(_) => "INVALID_JSON",
            ClientError::MalformedState { .. } => "MALFORMED_STATE",
            ClientError::RouteNotFound(_) => "ROUTE_NOT_FOUND",
            ClientError::Config(_) => "CONFIG_ERROR",
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized(_))
    }

    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ClientError::MalformedState {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Build the error for a non-success backend status.
    ///
    /// FastAPI reports failures as `{"detail": "..."}`; fall back to the raw
    /// body, then to the canonical reason phrase.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

        match status.as_u16() {
            401 => ClientError::Unauthorized(message),
            403 => ClientError::Forbidden(message),
            code => ClientError::Api { status: code, message },
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
