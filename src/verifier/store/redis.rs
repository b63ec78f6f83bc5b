use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use tracing::{info, warn};
use uuid::Uuid;

use super::SessionStore;
use crate::{
    core::util::{Clock, SystemClock},
    verifier::{error::StoreError, session::Session},
};

/// Replaces the record only when its stored `version` matches ARGV[1].
const COMPARE_AND_SET: &str = r#"
    local current = redis.call('GET', KEYS[1])
    if not current then
        return 0
    end
    local decoded = cjson.decode(current)
    if tonumber(decoded.version) ~= tonumber(ARGV[1]) then
        return 0
    end
    redis.call('SET', KEYS[1], ARGV[2], 'EX', ARGV[3])
    return 1
"#;

/// Session store backed by Redis, for deployments with more than one verifier instance.
///
/// Records are JSON under `session:<id>` with a Redis expiry matching the session's time to live.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    pub async fn new(url: &str) -> Result<Self, StoreError> {
        Self::with_clock(url, Arc::new(SystemClock)).await
    }

    pub async fn with_clock(url: &str, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        info!("Redis connection established");
        Ok(Self { conn, clock })
    }

    fn key(id: Uuid) -> String {
        format!("session:{id}")
    }

    /// Redis rejects a zero expiry.
    fn ttl_secs(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

#[async_trait]
impl SessionStore for RedisStore {
    async fn get(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        let mut conn = self.conn.clone();
        let result: Option<String> = redis::cmd("GET")
            .arg(Self::key(id))
            .query_async(&mut conn)
            .await?;

        let Some(json) = result else {
            return Ok(None);
        };
        let session: Session = serde_json::from_str(&json)?;
        if session.is_expired(self.clock.now()) {
            if let Err(e) = self.delete(id).await {
                warn!(session_id = %id, error = %e, "failed to delete expired session");
            }
            return Ok(None);
        }
        Ok(Some(session))
    }

    async fn set(&self, id: Uuid, session: Session, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(&session)?;

        redis::cmd("SET")
            .arg(Self::key(id))
            .arg(json)
            .arg("EX")
            .arg(Self::ttl_secs(ttl))
            .query_async::<()>(&mut conn)
            .await?;

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(Self::key(id))
            .query_async::<()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn compare_and_set(
        &self,
        id: Uuid,
        expected_version: u64,
        session: Session,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(&session)?;

        let written: i64 = redis::Script::new(COMPARE_AND_SET)
            .key(Self::key(id))
            .arg(expected_version)
            .arg(json)
            .arg(Self::ttl_secs(ttl))
            .invoke_async(&mut conn)
            .await?;

        Ok(written == 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bad_url_is_unavailable() {
        let err = RedisStore::new("not-a-redis-url").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)), "{err}");
    }
}
