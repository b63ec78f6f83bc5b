use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::debug;
use uuid::Uuid;

use super::SessionStore;
use crate::{
    core::util::{Clock, SystemClock},
    verifier::{error::StoreError, session::Session},
};

/// How often a sweeper started by a [Verifier](crate::verifier::Verifier) runs by default.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct Entry {
    session: Session,
    deadline: DateTime<Utc>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now <= self.deadline && !self.session.is_expired(now)
    }
}

/// A local in-memory store.
///
/// Expiry is checked lazily on every read; [sweep](Self::sweep) (or a task started with
/// [spawn_sweeper](Self::spawn_sweeper)) reclaims records nobody reads again.
///
/// # Warning
/// Sessions live in this process only, so it does not work for a multi-instance deployment.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<Uuid, Entry>>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Default::default(),
            clock,
        }
    }

    /// Drop every expired record, returning how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        before - entries.len()
    }

    /// Number of records held, live or not.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Run [sweep](Self::sweep) every `interval` on the current tokio runtime until the returned
    /// handle is dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> SweeperHandle {
        let store = self.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = store.sweep().await;
                if removed > 0 {
                    debug!(removed, "swept expired sessions");
                }
            }
        });
        SweeperHandle {
            task,
            store: self.clone(),
        }
    }

    fn deadline(&self, ttl: Duration) -> DateTime<Utc> {
        let now = self.clock.now();
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Aborts the background sweeper when dropped.
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
    store: MemoryStore,
}

impl SweeperHandle {
    /// The store being swept.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        match entries.get(&id) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.session.clone())),
            Some(_) => {
                entries.remove(&id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, id: Uuid, session: Session, ttl: Duration) -> Result<(), StoreError> {
        let deadline = self.deadline(ttl);
        self.entries
            .lock()
            .await
            .insert(id, Entry { session, deadline });
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.entries.lock().await.remove(&id);
        Ok(())
    }

    async fn compare_and_set(
        &self,
        id: Uuid,
        expected_version: u64,
        session: Session,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = self.clock.now();
        let deadline = self.deadline(ttl);
        let mut entries = self.entries.lock().await;
        match entries.get_mut(&id) {
            Some(entry) if entry.is_live(now) && entry.session.version == expected_version => {
                *entry = Entry { session, deadline };
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
