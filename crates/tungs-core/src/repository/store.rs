//! Session store port and an in-memory implementation.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;
use tungs_types::error::StoreError;
use tungs_types::session::Session;

use crate::session::codec;

/// Durable local cache holding at most one session record.
///
/// `get` never fails on a corrupt record: implementations log it and return
/// `Ok(None)`. `Err` is reserved for the storage medium itself failing.
pub trait SessionStore: Send + Sync {
    fn get(&self) -> impl std::future::Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Replace the stored record. The write is atomic.
    fn set(&self, session: &Session) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Remove the stored record. No-op if absent.
    fn clear(&self) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

impl<T: SessionStore> SessionStore for Arc<T> {
    async fn get(&self) -> Result<Option<Session>, StoreError> {
        (**self).get().await
    }

    async fn set(&self, session: &Session) -> Result<(), StoreError> {
        (**self).set(session).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }
}

/// Process-local store that keeps the encoded record in memory.
///
/// Holds the same encoded form the durable store writes, so a corrupt blob
/// can be injected with [`MemorySessionStore::with_raw`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    raw: Mutex<Option<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an arbitrary stored blob.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }

    /// The encoded record currently stored, if any.
    pub fn raw(&self) -> Option<String> {
        self.raw.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SessionStore for MemorySessionStore {
    async fn get(&self) -> Result<Option<Session>, StoreError> {
        let Some(raw) = self.raw() else {
            return Ok(None);
        };
        match codec::decode(&raw) {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(error = %e, "discarding unreadable session record");
                Ok(None)
            }
        }
    }

    async fn set(&self, session: &Session) -> Result<(), StoreError> {
        let encoded = codec::encode(session)?;
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = Some(encoded);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.raw.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tungs_types::identity::Identity;
    use tungs_types::profile::UserProfile;
    use tungs_types::quota::QuotaPolicy;

    fn sample() -> Session {
        let identity = Identity::local("ada@example.com");
        let profile = UserProfile::default_free(&QuotaPolicy::default(), Utc::now());
        Session::new(identity, profile, false)
    }

    #[tokio::test]
    async fn set_then_get_returns_session() {
        let store = MemorySessionStore::new();
        let session = sample();
        store.set(&session).await.unwrap();
        assert_eq!(store.get().await.unwrap(), Some(session));
    }

    #[tokio::test]
    async fn clear_removes_record() {
        let store = MemorySessionStore::new();
        store.set(&sample()).await.unwrap();
        store.clear().await.unwrap();
        assert!(store.get().await.unwrap().is_none());
        assert!(store.raw().is_none());

        // Clearing an empty store is fine.
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_record_reads_as_absent() {
        let store = MemorySessionStore::with_raw("{\"sessionId\": \"tru");
        assert!(store.get().await.unwrap().is_none());
    }
}
