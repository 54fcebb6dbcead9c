//! High-level API for the persisted platform session.

use crate::{SecureStorage, StorageError, StorageKeys, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tokens with less than this many seconds left count as expired.
pub const EXPIRY_LEEWAY_SECS: i64 = 60;

/// Identity and expiry stored beside the tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// When the access token expires.
    pub expires_at: DateTime<Utc>,
}

impl SessionMeta {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.signed_duration_since(now).num_seconds() < EXPIRY_LEEWAY_SECS
    }
}

/// A complete persisted session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub access_token: String,
    pub refresh_token: String,
    pub meta: SessionMeta,
}

impl StoredSession {
    pub fn is_expired(&self) -> bool {
        self.meta.is_expired_at(Utc::now())
    }
}

pub struct SecretsManager {
    storage: Box<dyn SecureStorage>,
}

impl SecretsManager {
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    pub fn access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::ACCESS_TOKEN)
    }

    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::REFRESH_TOKEN)
    }

    pub fn session_meta(&self) -> StorageResult<Option<SessionMeta>> {
        match self.storage.get(StorageKeys::SESSION_META)? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StorageError::Encoding(e.to_string())),
            None => Ok(None),
        }
    }

    /// True when both an access token and metadata are stored.
    pub fn has_session(&self) -> StorageResult<bool> {
        Ok(self.storage.has(StorageKeys::ACCESS_TOKEN)?
            && self.storage.has(StorageKeys::SESSION_META)?)
    }

    /// Missing metadata counts as expired.
    pub fn is_session_expired(&self) -> StorageResult<bool> {
        Ok(self
            .session_meta()?
            .map(|meta| meta.is_expired_at(Utc::now()))
            .unwrap_or(true))
    }

    /// Load the full session, or `None` when any part is missing.
    pub fn load_session(&self) -> StorageResult<Option<StoredSession>> {
        let (Some(access_token), Some(refresh_token), Some(meta)) =
            (self.access_token()?, self.refresh_token()?, self.session_meta()?)
        else {
            return Ok(None);
        };

        Ok(Some(StoredSession {
            access_token,
            refresh_token,
            meta,
        }))
    }

    pub fn store_session(&self, session: &StoredSession) -> StorageResult<()> {
        let meta =
            serde_json::to_string(&session.meta).map_err(|e| StorageError::Encoding(e.to_string()))?;

        self.storage
            .set(StorageKeys::ACCESS_TOKEN, &session.access_token)?;
        self.storage
            .set(StorageKeys::REFRESH_TOKEN, &session.refresh_token)?;
        self.storage.set(StorageKeys::SESSION_META, &meta)?;

        tracing::debug!(user_id = %session.meta.user_id, "session stored");
        Ok(())
    }

    /// Remove every session key. Keys that fail to delete are logged, not
    /// returned, so a partial failure still clears what it can.
    pub fn clear_session(&self) -> StorageResult<()> {
        for key in StorageKeys::ALL {
            if let Err(e) = self.storage.delete(key) {
                tracing::warn!(key, error = %e, "failed to delete session key");
            }
        }
        tracing::debug!("session cleared");
        Ok(())
    }
}
