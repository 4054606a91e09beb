use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// The backend answered 401. The session token has been cleared.
    #[error("Unauthorized - please login again")]
    Unauthorized { body: Option<Value> },

    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Failed to encode request body: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Build a `Status` error from a non-2xx status and its parsed body.
    ///
    /// The message is the body's `error` field, else its `message` field,
    /// else `HTTP <code>`.
    pub fn from_status(status: StatusCode, body: Option<&Value>) -> Self {
        let message = body
            .and_then(error_text)
            .map(|m| Self::truncate_body(&m))
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        ApiError::Status { status, message }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Unauthorized { .. } => Some(StatusCode::UNAUTHORIZED),
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }

    /// The server's own explanation, when the failure came with a body.
    pub fn server_message(&self) -> Option<String> {
        match self {
            ApiError::Unauthorized { body } => body.as_ref().and_then(error_text),
            ApiError::Status { message, .. } => Some(message.clone()),
            _ => None,
        }
    }
}

/// `error`, else `message`, from a JSON error body.
pub(crate) fn error_text(body: &Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .filter_map(|key| body.get(*key))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Null | Value::String(_) => None,
            other => Some(other.to_string()),
        })
}
