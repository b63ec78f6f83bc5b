use std::time::Duration;

use http::StatusCode;

use crate::ErrorBody;

/// Message shown to wallets and browsers for every failed verification.
pub const AGE_VERIFICATION_FAILED: &str = "Age verification failed";

const SESSION_NOT_FOUND: &str = "Session not found or expired";

/// Errors from a [SessionStore](super::store::SessionStore) backend.
///
/// A missing session is not an error at this level; stores return `None`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("session store did not answer within {0:?}")]
    Timeout(Duration),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "redis")]
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Everything a [Verifier](super::Verifier) operation can fail with.
#[derive(Debug, thiserror::Error)]
pub enum VerifierError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("session not found or expired")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl VerifierError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            VerifierError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            VerifierError::Verification(_) => StatusCode::FORBIDDEN,
            VerifierError::NotFound => StatusCode::NOT_FOUND,
            VerifierError::Conflict(_) => StatusCode::CONFLICT,
            VerifierError::Configuration(_)
            | VerifierError::Store(_)
            | VerifierError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The message that may cross the trust boundary.
    ///
    /// Verification detail, store failures and configuration problems are only ever logged.
    pub fn public_message(&self) -> String {
        match self {
            VerifierError::InvalidInput(reason) => reason.clone(),
            VerifierError::NotFound => SESSION_NOT_FOUND.into(),
            VerifierError::Conflict(reason) => reason.clone(),
            VerifierError::Verification(_) => AGE_VERIFICATION_FAILED.into(),
            VerifierError::Configuration(_) => "Verifier is misconfigured".into(),
            VerifierError::Store(_) => "Session storage unavailable".into(),
            VerifierError::Internal(_) => "Internal server error".into(),
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.public_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(
            VerifierError::InvalidInput("missing state".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(VerifierError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            VerifierError::Conflict("already processed".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            VerifierError::Store(StoreError::Timeout(Duration::from_millis(10))).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internals_do_not_leak() {
        let err = VerifierError::Verification("Untrusted issuer: did:example:evil".into());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_body().error, "Age verification failed");

        let err = VerifierError::Store(StoreError::Unavailable("redis://10.0.0.3 refused".into()));
        assert!(!err.public_message().contains("10.0.0.3"));
    }
}
