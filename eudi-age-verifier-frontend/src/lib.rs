//! Age-verification data structures that are needed on the frontend, without all of the other
//! dependencies that can cause compilation issues with web targets.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// `Access-Control-Allow-Origin` value for every verifier endpoint. The caller is an arbitrary
/// wallet application, not the hosting site's own origin.
pub const CORS_ALLOW_ORIGIN: &str = "*";

/// Status of a verification session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Session created, waiting for the wallet to post a presentation.
    Pending,
    /// Verifier has received the presentation and is now processing it.
    Scanned,
    /// The presentation was verified and the holder is old enough.
    Completed,
    /// The presentation was rejected.
    Failed,
}

impl SessionStatus {
    /// Whether the verifier has committed an outcome for the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

/// Outcome stored on a `completed` session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResult {
    pub is_old_enough: bool,
    pub claims: Map<String, Json>,
}

/// Response to a session-create request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: String,
    /// ISO-8601 timestamp.
    pub expires_at: String,
}

/// Response to a session-status poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatusView {
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SessionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response returned to the wallet once its presentation has been accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackAccepted {
    pub status: String,
    pub redirect_uri: String,
}

impl CallbackAccepted {
    pub fn success(redirect_uri: String) -> Self {
        Self {
            status: "success".into(),
            redirect_uri,
        }
    }
}

/// Structured error payload for every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
