//! Session persistence for the todo-sync client.
//!
//! Two backends implement [`SecureStorage`]:
//! - [`FileStorage`]: one JSON map on disk, written atomically, owner-only
//! - [`MemoryStorage`]: process-local map for tests and ephemeral runs
//!
//! [`SecretsManager`] layers the platform session (tokens + metadata) on top.

mod file;
mod keys;
mod memory;
mod secrets;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use secrets::{SecretsManager, SessionMeta, StoredSession, EXPIRY_LEEWAY_SECS};
pub use traits::SecureStorage;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backing file exists but is not a JSON string map.
    #[error("Corrupt storage file: {0}")]
    Corrupt(String),

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
