use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use uuid::Uuid;

use super::{error::StoreError, session::Session};

pub use self::memory::{MemoryStore, SweeperHandle, DEFAULT_SWEEP_INTERVAL};
#[cfg(feature = "redis")]
pub use self::redis::RedisStore;

mod memory;
#[cfg(feature = "redis")]
mod redis;

/// Persistence for [Session] records, each with its own time to live.
///
/// Stores hold no protocol logic. They must still treat a record whose `expires_at` has passed
/// as absent, whether or not the backend has evicted it yet.
#[async_trait]
pub trait SessionStore: Debug + Send + Sync {
    /// Fetch a live session.
    async fn get(&self, id: Uuid) -> Result<Option<Session>, StoreError>;

    /// Insert or overwrite a session, restarting its time to live.
    async fn set(&self, id: Uuid, session: Session, ttl: Duration) -> Result<(), StoreError>;

    /// Remove a session. Removing an unknown id is not an error.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;

    /// Overwrite a session only if the stored record is live and still at `expected_version`.
    ///
    /// Returns whether the write happened.
    async fn compare_and_set(
        &self,
        id: Uuid,
        expected_version: u64,
        session: Session,
        ttl: Duration,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    async fn get(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        (**self).get(id).await
    }

    async fn set(&self, id: Uuid, session: Session, ttl: Duration) -> Result<(), StoreError> {
        (**self).set(id, session, ttl).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        (**self).delete(id).await
    }

    async fn compare_and_set(
        &self,
        id: Uuid,
        expected_version: u64,
        session: Session,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        (**self)
            .compare_and_set(id, expected_version, session, ttl)
            .await
    }
}

/// Bounds every call to the wrapped store, reporting [StoreError::Timeout] instead of hanging.
#[derive(Debug, Clone)]
pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: SessionStore> TimeoutStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T, F>(&self, operation: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, StoreError>> + Send,
    {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for TimeoutStore<S> {
    async fn get(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        self.bounded(self.inner.get(id)).await
    }

    async fn set(&self, id: Uuid, session: Session, ttl: Duration) -> Result<(), StoreError> {
        self.bounded(self.inner.set(id, session, ttl)).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.bounded(self.inner.delete(id)).await
    }

    async fn compare_and_set(
        &self,
        id: Uuid,
        expected_version: u64,
        session: Session,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        self.bounded(self.inner.compare_and_set(id, expected_version, session, ttl))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A store whose every call never completes.
    #[derive(Debug)]
    struct Stalled;

    #[async_trait]
    impl SessionStore for Stalled {
        async fn get(&self, _: Uuid) -> Result<Option<Session>, StoreError> {
            std::future::pending().await
        }

        async fn set(&self, _: Uuid, _: Session, _: Duration) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn delete(&self, _: Uuid) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn compare_and_set(
            &self,
            _: Uuid,
            _: u64,
            _: Session,
            _: Duration,
        ) -> Result<bool, StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_store_times_out() {
        let store = TimeoutStore::new(Stalled, Duration::from_millis(250));

        let err = store.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(d) if d == Duration::from_millis(250)));

        let err = store.delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
    }
}
