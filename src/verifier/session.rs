use std::{fmt::Debug, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    core::util::{new_session_id, Clock},
    SessionCreated, SessionResult, SessionStatus, SessionStatusView,
};

use super::{error::StoreError, store::SessionStore};

/// How long a session lives after its last write.
pub const SESSION_TTL: Duration = Duration::from_secs(600);

/// A verification session, from QR code to age decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Doubles as the OpenID4VP `state`.
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub min_age: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SessionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Incremented on every write, for conditional updates.
    #[serde(default)]
    pub version: u64,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn view(&self) -> SessionStatusView {
        SessionStatusView {
            status: self.status,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }

    pub fn created(&self) -> SessionCreated {
        SessionCreated {
            session_id: self.session_id.to_string(),
            expires_at: self.expires_at.to_rfc3339(),
        }
    }
}

/// Fields to merge into a [Session]. `None` leaves the current value alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub status: Option<SessionStatus>,
    pub result: Option<SessionResult>,
    pub error: Option<String>,
}

impl SessionUpdate {
    pub fn scanned() -> Self {
        Self {
            status: Some(SessionStatus::Scanned),
            ..Default::default()
        }
    }

    pub fn completed(result: SessionResult) -> Self {
        Self {
            status: Some(SessionStatus::Completed),
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(SessionStatus::Failed),
            result: None,
            error: Some(error.into()),
        }
    }

    fn apply(self, session: &mut Session) {
        if let Some(status) = self.status {
            session.status = status;
        }
        if let Some(result) = self.result {
            session.result = Some(result);
        }
        if let Some(error) = self.error {
            session.error = Some(error);
        }
    }
}

/// Outcome of [SessionManager::transition].
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Applied(Session),
    NotFound,
    /// The session was not in the expected status, or another writer got there first.
    Rejected { current: Option<SessionStatus> },
}

/// Owns the session state machine. The only component that writes sessions.
#[derive(Debug, Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    fn expiry_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + chrono::Duration::seconds(SESSION_TTL.as_secs() as i64)
    }

    pub async fn create_session(&self, min_age: u32) -> Result<Session, StoreError> {
        let now = self.clock.now();
        let session = Session {
            session_id: new_session_id(),
            status: SessionStatus::Pending,
            min_age,
            created_at: now,
            expires_at: self.expiry_from(now),
            result: None,
            error: None,
            version: 0,
        };
        self.store
            .set(session.session_id, session.clone(), SESSION_TTL)
            .await?;
        debug!(session_id = %session.session_id, min_age, "session created");
        Ok(session)
    }

    /// A live session, or `None` if it never existed, was deleted or has expired.
    pub async fn get_session(&self, id: Uuid) -> Result<Option<Session>, StoreError> {
        match self.store.get(id).await? {
            Some(session) if session.is_expired(self.clock.now()) => {
                if let Err(e) = self.store.delete(id).await {
                    warn!(session_id = %id, error = %e, "failed to delete expired session");
                }
                Ok(None)
            }
            session => Ok(session),
        }
    }

    /// Merge `update` into a live session and restart its time to live from now.
    ///
    /// Unconditional: concurrent updates race and the last write wins. Use
    /// [transition](Self::transition) when only one writer may succeed.
    pub async fn update_session(
        &self,
        id: Uuid,
        update: SessionUpdate,
    ) -> Result<Option<Session>, StoreError> {
        let Some(mut session) = self.get_session(id).await? else {
            return Ok(None);
        };
        self.advance(&mut session, update);
        self.store.set(id, session.clone(), SESSION_TTL).await?;
        Ok(Some(session))
    }

    /// Apply `update` only if the session is currently in `from`, atomically with respect to
    /// other writers.
    pub async fn transition(
        &self,
        id: Uuid,
        from: SessionStatus,
        update: SessionUpdate,
    ) -> Result<Transition, StoreError> {
        let Some(mut session) = self.get_session(id).await? else {
            return Ok(Transition::NotFound);
        };
        if session.status != from {
            return Ok(Transition::Rejected {
                current: Some(session.status),
            });
        }

        let expected_version = session.version;
        self.advance(&mut session, update);
        if self
            .store
            .compare_and_set(id, expected_version, session.clone(), SESSION_TTL)
            .await?
        {
            Ok(Transition::Applied(session))
        } else {
            debug!(session_id = %id, "lost a concurrent session update");
            Ok(Transition::Rejected { current: None })
        }
    }

    /// Idempotent.
    pub async fn delete_session(&self, id: Uuid) -> Result<(), StoreError> {
        self.store.delete(id).await
    }

    fn advance(&self, session: &mut Session, update: SessionUpdate) {
        update.apply(session);
        session.expires_at = self.expiry_from(self.clock.now());
        session.version += 1;
    }
}
