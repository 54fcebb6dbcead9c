//! Synchronizer error types.

use auth_session::AuthError;
use realtime_feed::RealtimeError;
use supabase_platform::PlatformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// No user is attached to the synchronizer.
    #[error("Not signed in")]
    NotSignedIn,

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Realtime error: {0}")]
    Realtime(#[from] RealtimeError),

    /// The spawned operation panicked or was aborted.
    #[error("Task failed: {0}")]
    Task(String),
}

/// Result type alias using SyncError.
pub type SyncResult<T> = Result<T, SyncError>;
