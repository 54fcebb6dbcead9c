//! Platform error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlatformError {
    /// Transport failure: no usable response arrived.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The platform answered with a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PlatformError {
    /// Connection failures, timeouts and 5xx answers.
    pub fn is_transient(&self) -> bool {
        match self {
            PlatformError::Http(e) => {
                e.is_connect()
                    || e.is_timeout()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            PlatformError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status, when the platform produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            PlatformError::Api { status, .. } => Some(*status),
            PlatformError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias using PlatformError.
pub type PlatformResult<T> = Result<T, PlatformError>;

const MESSAGE_FIELDS: [&str; 4] = ["error_description", "msg", "message", "error"];

/// Pull a human-readable message out of an error body.
///
/// GoTrue and PostgREST disagree on the field name; the first non-empty
/// string among `error_description`, `msg`, `message`, `error` wins. Falls back
/// to the status reason phrase, then to the bare status code.
pub fn extract_error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        for field in MESSAGE_FIELDS {
            if let Some(msg) = map.get(field).and_then(|v| v.as_str()) {
                let msg = msg.trim();
                if !msg.is_empty() {
                    return msg.to_string();
                }
            }
        }
    }

    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}
