//! Storage trait definitions.

use crate::StorageResult;

/// String key/value store for session secrets.
pub trait SecureStorage: Send + Sync {
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Returns whether the key existed.
    fn delete(&self, key: &str) -> StorageResult<bool>;

    fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl<T: SecureStorage + ?Sized> SecureStorage for std::sync::Arc<T> {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        (**self).delete(key)
    }
}
