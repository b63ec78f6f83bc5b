use std::{
    fmt::Debug,
    sync::{Arc, PoisonError, RwLock},
};

use base64::prelude::*;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use uuid::Uuid;

/// Source of the current time.
///
/// Injected wherever expiry is decided so that stores, sessions and age checks agree on "now".
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a given instant that only moves when told to.
#[derive(Debug, Clone)]
pub struct FixedClock(Arc<RwLock<DateTime<Utc>>>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(Arc::new(RwLock::new(at)))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.0.write().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A fresh 128-bit random session identifier.
pub fn new_session_id() -> Uuid {
    Uuid::new_v4()
}

/// A fresh 16-byte random nonce, base64url encoded.
pub fn random_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_clock_advances() {
        let start = Utc.with_ymd_and_hms(2024, 6, 14, 12, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        let shared = clock.clone();

        clock.advance(Duration::seconds(30));
        assert_eq!(shared.now(), start + Duration::seconds(30));
    }

    #[test]
    fn nonces_are_unique_and_sized() {
        let a = random_nonce();
        let b = random_nonce();
        assert_ne!(a, b);
        assert_eq!(BASE64_URL_SAFE_NO_PAD.decode(a).unwrap().len(), 16);
    }
}
