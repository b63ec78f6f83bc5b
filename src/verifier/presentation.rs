use std::{collections::BTreeSet, sync::Arc};

use chrono::{DateTime, Datelike, NaiveDate};
use p256::ecdsa::{signature::Verifier as _, Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};
use tracing::debug;

use crate::{core::util::Clock, utils::CompactJwt};

/// Issuer of the credentials minted by the development mock wallet.
pub const DEFAULT_TRUSTED_ISSUER: &str = "did:example:eudi-issuer";

/// `assertion.method` of every age decision.
pub const ASSERTION_METHOD: &str = "eudi-wallet";

/// Credential issuers whose presentations are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedIssuers(BTreeSet<String>);

impl Default for TrustedIssuers {
    /// Development allow-list only. Production deployments supply their own issuers.
    fn default() -> Self {
        Self::new([DEFAULT_TRUSTED_ISSUER])
    }
}

impl TrustedIssuers {
    pub fn new<I, S>(issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(issuers.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, issuer: &str) -> bool {
        self.0.contains(issuer)
    }
}

/// How presentation JWTs are authenticated.
#[derive(Debug, Clone, Default)]
pub struct VerificationOptions {
    pub trusted_issuers: TrustedIssuers,
    /// ES256 key the presentation must be signed with.
    pub public_key: Option<VerifyingKey>,
    /// Decode without checking the signature. Testing only.
    pub skip_signature_verification: bool,
}

/// Why a presentation was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresentationError {
    #[error("Invalid JWT format: {0}")]
    MalformedJwt(String),
    #[error("JWT signature verification failed")]
    InvalidSignature,
    #[error("JWT has expired")]
    Expired,
    #[error("JWT is not yet valid")]
    NotYetValid,
    #[error("JWT payload does not contain iss claim")]
    MissingIssuer,
    #[error("Untrusted issuer: {0}")]
    UntrustedIssuer(String),
    #[error("JWT payload does not contain vp claim")]
    MissingVp,
    #[error("VP does not contain a verifiable credential")]
    MissingCredential,
    #[error("VC does not contain credentialSubject")]
    MissingCredentialSubject,
    #[error("Either publicKey or skipSignatureVerification must be provided")]
    NoVerificationMode,
}

/// Outcome of decoding a presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_claims: Option<Map<String, Json>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<Map<String, Json>, PresentationError>> for VerificationResult {
    fn from(decoded: Result<Map<String, Json>, PresentationError>) -> Self {
        match decoded {
            Ok(claims) => Self {
                valid: true,
                verified_claims: Some(claims),
                error: None,
            },
            Err(e) => Self {
                valid: false,
                verified_claims: None,
                error: Some(e.to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeAssertion {
    pub method: String,
    /// `>=<minAge>`
    pub age_range: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeVerificationResult {
    pub is_old_enough: bool,
    pub assertion: AgeAssertion,
}

impl AgeVerificationResult {
    fn new(min_age: u32, is_old_enough: bool, error: Option<String>) -> Self {
        Self {
            is_old_enough,
            assertion: AgeAssertion {
                method: ASSERTION_METHOD.into(),
                age_range: format!(">={min_age}"),
                error,
            },
        }
    }
}

/// Authenticates presentation JWTs and decides age predicates from their claims.
#[derive(Debug, Clone)]
pub struct PresentationVerifier {
    options: VerificationOptions,
    clock: Arc<dyn Clock>,
}

impl PresentationVerifier {
    pub fn new(options: VerificationOptions, clock: Arc<dyn Clock>) -> Self {
        Self { options, clock }
    }

    pub fn options(&self) -> &VerificationOptions {
        &self.options
    }

    /// Authenticate `jwt`, check its issuer and return the `credentialSubject` of the first
    /// credential in the presentation.
    ///
    /// A signature-checked presentation must also be within its `nbf`/`exp` window, when it
    /// carries one.
    pub fn decode(&self, jwt: &str) -> Result<Map<String, Json>, PresentationError> {
        let key = match (&self.options.public_key, self.options.skip_signature_verification) {
            (_, true) => None,
            (Some(key), false) => Some(key),
            (None, false) => return Err(PresentationError::NoVerificationMode),
        };

        let parsed =
            CompactJwt::parse(jwt).map_err(|e| PresentationError::MalformedJwt(e.to_string()))?;
        if let Some(key) = key {
            verify_es256(&parsed, key)?;
        }

        let mut payload: Map<String, Json> = parsed
            .payload()
            .map_err(|e| PresentationError::MalformedJwt(e.to_string()))?;
        if key.is_some() {
            self.check_validity_window(&payload)?;
        }

        let issuer = match payload.get("iss") {
            Some(Json::String(iss)) => iss.as_str(),
            _ => return Err(PresentationError::MissingIssuer),
        };
        if !self.options.trusted_issuers.contains(issuer) {
            return Err(PresentationError::UntrustedIssuer(issuer.to_owned()));
        }

        let vp = match payload.remove("vp") {
            Some(Json::Object(vp)) => vp,
            _ => return Err(PresentationError::MissingVp),
        };

        // Only the first credential is considered.
        let credential = vp
            .get("verifiableCredential")
            .and_then(Json::as_array)
            .and_then(|credentials| credentials.first())
            .ok_or(PresentationError::MissingCredential)?;

        match credential.get("credentialSubject") {
            Some(Json::Object(subject)) => Ok(subject.clone()),
            _ => Err(PresentationError::MissingCredentialSubject),
        }
    }

    fn check_validity_window(&self, payload: &Map<String, Json>) -> Result<(), PresentationError> {
        let now = self.clock.now().timestamp();
        let numeric = |claim: &str| match payload.get(claim) {
            None => Ok(None),
            Some(value) => value.as_f64().map(Some).ok_or_else(|| {
                PresentationError::MalformedJwt(format!("{claim} claim must be a number"))
            }),
        };
        // Seconds since the epoch, no leeway.
        if let Some(exp) = numeric("exp")? {
            if exp <= now as f64 {
                return Err(PresentationError::Expired);
            }
        }
        if let Some(nbf) = numeric("nbf")? {
            if nbf > now as f64 {
                return Err(PresentationError::NotYetValid);
            }
        }
        Ok(())
    }

    pub fn verify_presentation(&self, jwt: &str) -> VerificationResult {
        self.decode(jwt).into()
    }

    /// Decode `jwt` and evaluate the age predicate for `min_age`.
    ///
    /// A presentation that fails to decode is never old enough; the reason is carried in
    /// `assertion.error`.
    pub fn verify_age(&self, jwt: &str, min_age: u32) -> AgeVerificationResult {
        match self.decode(jwt) {
            Ok(claims) => {
                let is_old_enough = self.check_age(&claims, min_age);
                AgeVerificationResult::new(min_age, is_old_enough, None)
            }
            Err(e) => {
                debug!(error = %e, "presentation rejected");
                AgeVerificationResult::new(min_age, false, Some(e.to_string()))
            }
        }
    }

    /// [check_age] evaluated on today's date.
    pub fn check_age(&self, claims: &Map<String, Json>, min_age: u32) -> bool {
        check_age(claims, min_age, self.clock.now().date_naive())
    }
}

fn verify_es256(jwt: &CompactJwt<'_>, key: &VerifyingKey) -> Result<(), PresentationError> {
    let header: Map<String, Json> = jwt
        .header()
        .map_err(|e| PresentationError::MalformedJwt(e.to_string()))?;
    if header.get("alg").and_then(Json::as_str) != Some("ES256") {
        return Err(PresentationError::InvalidSignature);
    }
    let signature = jwt
        .signature()
        .ok()
        .and_then(|bytes| Signature::from_slice(&bytes).ok())
        .ok_or(PresentationError::InvalidSignature)?;
    key.verify(jwt.signing_input().as_bytes(), &signature)
        .map_err(|_| PresentationError::InvalidSignature)
}

/// Decide whether the holder described by `claims` is at least `min_age` on `today`.
///
/// Checks, first match wins: the `age_over_18` / `age_over_21` predicates, then `birthdate`,
/// then a numeric `age`. Anything else is not old enough.
pub fn check_age(claims: &Map<String, Json>, min_age: u32, today: NaiveDate) -> bool {
    let predicate = |name: &str| claims.get(name) == Some(&Json::Bool(true));
    if min_age == 18 && predicate("age_over_18") {
        return true;
    }
    if min_age == 21 && predicate("age_over_21") {
        return true;
    }

    if let Some(Json::String(birthdate)) = claims.get("birthdate") {
        if !birthdate.is_empty() {
            return match parse_birthdate(birthdate) {
                Some(birthdate) => age_on(birthdate, today) >= i64::from(min_age),
                None => false,
            };
        }
    }

    if let Some(age) = claims.get("age").and_then(Json::as_f64) {
        return age >= f64::from(min_age);
    }

    false
}

fn parse_birthdate(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Whole years between `birthdate` and `today`.
fn age_on(birthdate: NaiveDate, today: NaiveDate) -> i64 {
    let mut age = i64::from(today.year()) - i64::from(birthdate.year());
    if (today.month(), today.day()) < (birthdate.month(), birthdate.day()) {
        age -= 1;
    }
    age
}
