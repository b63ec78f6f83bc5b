#![allow(dead_code)]

use base64::prelude::*;
use chrono::{TimeZone, Utc};
use eudi_age_verifier::{
    core::util::FixedClock,
    utils::encode_segment,
    verifier::presentation::DEFAULT_TRUSTED_ISSUER,
};
use p256::ecdsa::{signature::Signer, Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde_json::{json, Value as Json};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const HOLDER: &str = "did:example:holder123";

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_test_writer())
        .try_init();
}

/// 2024-06-14T12:00:00Z.
pub fn clock() -> FixedClock {
    FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 14, 12, 0, 0).unwrap())
}

/// Mints JWT-VP presentations the way a wallet holding an age credential would.
pub struct MockWallet {
    key: SigningKey,
    issuer: String,
}

impl MockWallet {
    pub fn new() -> Self {
        Self {
            key: SigningKey::random(&mut OsRng),
            issuer: DEFAULT_TRUSTED_ISSUER.into(),
        }
    }

    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        *self.key.verifying_key()
    }

    /// Public JWK of the wallet key.
    pub fn jwk(&self) -> Json {
        let pk: p256::PublicKey = self.key.verifying_key().into();
        serde_json::from_str(&pk.to_jwk_string()).unwrap()
    }

    pub fn payload(&self, subject: Json) -> Json {
        let mut subject = subject;
        subject["id"] = json!(HOLDER);
        json!({
            "iss": self.issuer,
            "sub": HOLDER,
            "iat": 1718366400,
            "vp": {
                "@context": ["https://www.w3.org/2018/credentials/v1"],
                "type": ["VerifiablePresentation"],
                "holder": HOLDER,
                "verifiableCredential": [{
                    "@context": ["https://www.w3.org/2018/credentials/v1"],
                    "type": ["VerifiableCredential", "AgeCredential"],
                    "issuer": self.issuer,
                    "credentialSubject": subject,
                }],
            },
        })
    }

    /// ES256-signed presentation.
    pub fn present(&self, subject: Json) -> String {
        self.sign(&self.payload(subject))
    }

    /// `alg: none` presentation, for verifiers that skip signature checks.
    pub fn present_unsigned(&self, subject: Json) -> String {
        let header = encode_segment(&json!({ "alg": "none", "typ": "JWT" })).unwrap();
        let payload = encode_segment(&self.payload(subject)).unwrap();
        format!("{header}.{payload}.")
    }

    pub fn sign(&self, payload: &Json) -> String {
        let header = encode_segment(&json!({ "alg": "ES256", "typ": "JWT" })).unwrap();
        let payload = encode_segment(payload).unwrap();
        let signing_input = format!("{header}.{payload}");
        let signature: Signature = self.key.sign(signing_input.as_bytes());
        format!(
            "{signing_input}.{}",
            BASE64_URL_SAFE_NO_PAD.encode(signature.to_bytes())
        )
    }
}
