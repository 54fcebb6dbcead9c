//! Realtime error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The server refused the channel join.
    #[error("Join rejected: {0}")]
    JoinRejected(String),

    /// The channel was released or its connection task has ended.
    #[error("Channel closed")]
    Closed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Result type alias using RealtimeError.
pub type RealtimeResult<T> = Result<T, RealtimeError>;
