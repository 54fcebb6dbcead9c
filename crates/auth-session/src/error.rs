//! Authentication error types.

use supabase_platform::PlatformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    /// Email or password empty after trimming. Rejected before any request.
    #[error("Please enter both email and password")]
    MissingCredentials,

    #[error("Not signed in")]
    NotSignedIn,

    /// Session ended because the expired token could not be refreshed.
    #[error("Session expired")]
    SessionExpired,

    #[error("Invalid auth state transition: {0}")]
    InvalidStateTransition(String),

    /// The platform refused or could not be reached. Displays the platform's
    /// own message.
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("Storage error: {0}")]
    Storage(#[from] session_store::StorageError),
}

impl AuthError {
    /// Connection failures and 5xx answers. Such errors say nothing about
    /// whether a stored session is still good.
    pub fn is_transient(&self) -> bool {
        matches!(self, AuthError::Platform(e) if e.is_transient())
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
