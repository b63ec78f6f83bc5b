use std::sync::Arc;

use client::{Client, RedirectUriClient};
use error::{VerifierError, AGE_VERIFICATION_FAILED};
use p256::ecdsa::VerifyingKey;
use presentation::{
    AgeVerificationResult, PresentationError, PresentationVerifier, TrustedIssuers,
    VerificationOptions,
};
use request_builder::{ClaimsQueryStyle, RequestBuilder, RequestFormat};
use request_signer::{P256Signer, RequestSigner};
use session::{Session, SessionManager, SessionUpdate, Transition};
use store::{
    MemoryStore, SessionStore, SweeperHandle, TimeoutStore, DEFAULT_SWEEP_INTERVAL,
};
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    config::{BaseUrl, StoreConfig, VerifierConfig, DEFAULT_CALLBACK_PATH},
    core::{
        dcql_query::DEFAULT_PID_VCT,
        response::AuthorizationResponse,
        util::{Clock, SystemClock},
    },
    CallbackAccepted, SessionResult, SessionStatus, SessionStatusView,
};

pub mod client;
pub mod error;
pub mod pairwise;
pub mod presentation;
pub mod request_builder;
pub mod request_signer;
pub mod session;
pub mod store;

/// Age threshold used when a session is created without one.
pub const DEFAULT_MIN_AGE: u32 = 18;

/// Name the verifier introduces itself with in `client_metadata`.
pub const DEFAULT_CLIENT_NAME: &str = "Next EUDI Verifier";

/// An OpenID4VP age verifier, also known as the client.
///
/// Drives the wallet round trips: session creation, authorization request, callback, and
/// status polling.
#[derive(Debug, Clone)]
pub struct Verifier {
    client: Arc<dyn Client + Send + Sync>,
    origin: BaseUrl,
    callback: Url,
    request_format: RequestFormat,
    claims_query: ClaimsQueryStyle,
    client_name: String,
    pid_vct: String,
    sessions: SessionManager,
    presentations: PresentationVerifier,
    clock: Arc<dyn Clock>,
    _sweeper: Option<Arc<SweeperHandle>>,
}

impl Verifier {
    /// Build a new verifier.
    pub fn builder() -> VerifierBuilder {
        VerifierBuilder::default()
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// The URL wallets post their presentations to.
    pub fn callback(&self) -> &Url {
        &self.callback
    }

    pub fn request_format(&self) -> RequestFormat {
        self.request_format
    }

    /// Start a verification session for `min_age`, 18 if unset.
    pub async fn create_session(&self, min_age: Option<u32>) -> Result<Session, VerifierError> {
        Ok(self
            .sessions
            .create_session(min_age.unwrap_or(DEFAULT_MIN_AGE))
            .await?)
    }

    /// Begin building the authorization request for a session.
    pub fn build_authorization_request(&self, session_id: Uuid) -> RequestBuilder<'_> {
        RequestBuilder::new(self, session_id)
    }

    /// Process a presentation posted by the wallet.
    ///
    /// The session moves to `scanned`, then to `completed` if the holder is old enough. Otherwise
    /// it ends `failed` and the call returns [VerifierError::Verification]. Only the first post
    /// for a session is processed; later ones are a [VerifierError::Conflict].
    pub async fn handle_callback(
        &self,
        response: AuthorizationResponse,
    ) -> Result<CallbackAccepted, VerifierError> {
        let session_id: Uuid = response
            .state()
            .0
            .parse()
            .map_err(|_| VerifierError::InvalidInput("state is not a session id".into()))?;

        let Some(vp_token) = response.vp_token().first() else {
            return Err(VerifierError::InvalidInput("vp_token is empty".into()));
        };

        let session = match self
            .sessions
            .transition(session_id, SessionStatus::Pending, SessionUpdate::scanned())
            .await?
        {
            Transition::Applied(session) => session,
            Transition::NotFound => return Err(VerifierError::NotFound),
            Transition::Rejected { current } => {
                warn!(%session_id, ?current, "presentation posted to a session already in progress");
                return Err(VerifierError::Conflict(
                    "Presentation already received for this session".into(),
                ));
            }
        };
        info!(%session_id, "presentation received");

        let rejection = match self.presentations.decode(vp_token) {
            Ok(claims) if self.presentations.check_age(&claims, session.min_age) => {
                info!(%session_id, min_age = session.min_age, "age verified");
                let result = SessionResult {
                    is_old_enough: true,
                    claims,
                };
                self.commit(session_id, SessionUpdate::completed(result))
                    .await?;
                None
            }
            Ok(_) => Some(format!("holder is under {}", session.min_age)),
            Err(e @ PresentationError::NoVerificationMode) => {
                error!(%session_id, "no presentation verification mode is configured");
                self.commit(session_id, SessionUpdate::failed(AGE_VERIFICATION_FAILED))
                    .await?;
                return Err(VerifierError::Configuration(e.to_string()));
            }
            Err(e) => Some(e.to_string()),
        };

        if let Some(reason) = rejection {
            info!(%session_id, %reason, "presentation rejected");
            self.commit(session_id, SessionUpdate::failed(AGE_VERIFICATION_FAILED))
                .await?;
            return Err(VerifierError::Verification(reason));
        }

        Ok(CallbackAccepted::success(format!(
            "{}?session={session_id}",
            self.origin.origin_string()
        )))
    }

    /// Retrieve the current status of a session.
    ///
    /// A `completed` or `failed` session is returned once and then deleted.
    pub async fn poll_status(&self, session_id: Uuid) -> Result<SessionStatusView, VerifierError> {
        let session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or(VerifierError::NotFound)?;

        if session.status.is_terminal() {
            if let Err(e) = self.sessions.delete_session(session_id).await {
                warn!(%session_id, error = %e, "failed to delete finished session");
            } else {
                debug!(%session_id, "finished session deleted");
            }
        }
        Ok(session.view())
    }

    /// Run the presentation pipeline on `presentation` without a session.
    pub fn verify_age(
        &self,
        presentation: &str,
        min_age: u32,
    ) -> Result<AgeVerificationResult, VerifierError> {
        let options = self.presentations.options();
        if options.public_key.is_none() && !options.skip_signature_verification {
            error!("no presentation verification mode is configured");
            return Err(VerifierError::Configuration(
                PresentationError::NoVerificationMode.to_string(),
            ));
        }
        Ok(self.presentations.verify_age(presentation, min_age))
    }

    /// Record the outcome of a `scanned` session.
    async fn commit(&self, session_id: Uuid, update: SessionUpdate) -> Result<(), VerifierError> {
        match self
            .sessions
            .transition(session_id, SessionStatus::Scanned, update)
            .await?
        {
            Transition::Applied(_) => Ok(()),
            Transition::NotFound => Err(VerifierError::NotFound),
            Transition::Rejected { current } => Err(VerifierError::Conflict(format!(
                "session changed while verifying (now {current:?})"
            ))),
        }
    }
}

/// Builder struct for [Verifier].
#[derive(Debug, Clone)]
pub struct VerifierBuilder {
    origin: Option<BaseUrl>,
    callback_path: String,
    request_format: RequestFormat,
    claims_query: Option<ClaimsQueryStyle>,
    signer: Option<Arc<dyn RequestSigner + Send + Sync>>,
    session_store: Option<Arc<dyn SessionStore>>,
    clock: Option<Arc<dyn Clock>>,
    verification_options: VerificationOptions,
    client_name: String,
    pid_vct: String,
    sweeper: Option<Arc<SweeperHandle>>,
}

impl Default for VerifierBuilder {
    fn default() -> Self {
        Self {
            origin: None,
            callback_path: DEFAULT_CALLBACK_PATH.into(),
            request_format: RequestFormat::default(),
            claims_query: None,
            signer: None,
            session_store: None,
            clock: None,
            verification_options: VerificationOptions::default(),
            client_name: DEFAULT_CLIENT_NAME.into(),
            pid_vct: DEFAULT_PID_VCT.into(),
            sweeper: None,
        }
    }
}

impl VerifierBuilder {
    /// Build the verifier.
    ///
    /// Without a [session store](Self::with_session_store) the verifier keeps sessions in a
    /// [MemoryStore]. When called inside a tokio runtime, that store is swept every
    /// [DEFAULT_SWEEP_INTERVAL] for as long as the verifier lives; otherwise the caller must
    /// arrange for expired sessions to be reclaimed.
    pub fn build(self) -> Result<Verifier, VerifierError> {
        let Self {
            origin,
            callback_path,
            request_format,
            claims_query,
            signer,
            session_store,
            clock,
            verification_options,
            client_name,
            pid_vct,
            mut sweeper,
        } = self;

        let Some(origin) = origin else {
            return Err(VerifierError::Configuration(
                "origin is required, see `with_origin`".into(),
            ));
        };

        let callback = origin.join(&callback_path).map_err(|e| {
            VerifierError::Configuration(format!("invalid callback path '{callback_path}': {e}"))
        })?;

        if request_format.is_signed() && signer.is_none() {
            error!(%request_format, "signed request format configured without a signing key");
            return Err(VerifierError::Configuration(format!(
                "request format '{request_format}' requires a signing key, see `with_signer`"
            )));
        }

        let clock = clock.unwrap_or_else(|| Arc::new(SystemClock));
        let session_store = match session_store {
            Some(store) => store,
            None => {
                let store = MemoryStore::new(clock.clone());
                if tokio::runtime::Handle::try_current().is_ok() {
                    sweeper = Some(Arc::new(store.spawn_sweeper(DEFAULT_SWEEP_INTERVAL)));
                } else {
                    debug!("no tokio runtime, the default session store is not swept");
                }
                Arc::new(store)
            }
        };

        let mut client = RedirectUriClient::new(callback.clone());
        if let Some(signer) = signer {
            client = client.with_signer(signer);
        }

        Ok(Verifier {
            client: Arc::new(client),
            origin,
            callback,
            request_format,
            claims_query: claims_query.unwrap_or_else(|| request_format.default_claims_query()),
            client_name,
            pid_vct,
            sessions: SessionManager::new(session_store, clock.clone()),
            presentations: PresentationVerifier::new(verification_options, clock.clone()),
            clock,
            _sweeper: sweeper,
        })
    }

    /// Wire a builder from deployment configuration: session store, signing key, presentation
    /// trust and request profile.
    ///
    /// Must run inside a tokio runtime; the in-memory store's sweeper is spawned on it.
    pub async fn from_config(config: &VerifierConfig) -> Result<Self, VerifierError> {
        let mut builder = Self::default()
            .with_origin(config.origin.clone())
            .with_callback_path(&config.callback_path)
            .with_request_format(config.request_format)
            .with_claims_query(config.claims_query());

        if let Some(pem) = &config.signing_key_pem {
            let signer = P256Signer::from_pkcs8_pem(pem)
                .map_err(|e| VerifierError::Configuration(format!("{e:#}")))?;
            if let Some(jwk) = &config.public_jwk {
                signer
                    .ensure_matches(jwk)
                    .map_err(|e| VerifierError::Configuration(format!("{e:#}")))?;
            }
            builder = builder.with_signer(Arc::new(signer));
        } else if config.request_format.is_signed() {
            error!(request_format = %config.request_format, "EUDI_SIGNING_KEY_PEM is not set");
            return Err(VerifierError::Configuration(format!(
                "request format '{}' requires a signing key",
                config.request_format
            )));
        }

        let public_key = config
            .presentation_jwk
            .as_ref()
            .map(|jwk| {
                p256::PublicKey::from_jwk_str(&jwk.to_string())
                    .map(VerifyingKey::from)
                    .map_err(|e| {
                        VerifierError::Configuration(format!("invalid presentation JWK: {e}"))
                    })
            })
            .transpose()?;
        builder = builder.with_verification_options(VerificationOptions {
            trusted_issuers: TrustedIssuers::new(config.trusted_issuers.iter().cloned()),
            public_key,
            skip_signature_verification: config.skip_signature_verification,
        });

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let timeout = config.store_timeout();
        let store: Arc<dyn SessionStore> = match &config.store {
            StoreConfig::Memory => {
                let store = MemoryStore::new(clock.clone());
                builder.sweeper = Some(Arc::new(store.spawn_sweeper(config.sweep_interval())));
                Arc::new(TimeoutStore::new(store, timeout))
            }
            #[cfg(feature = "redis")]
            StoreConfig::Redis { url } => {
                let store = store::RedisStore::with_clock(url, clock.clone()).await?;
                Arc::new(TimeoutStore::new(store, timeout))
            }
            #[cfg(not(feature = "redis"))]
            StoreConfig::Redis { .. } => {
                return Err(VerifierError::Configuration(
                    "the Redis session store needs the `redis` feature".into(),
                ))
            }
        };
        info!(store = config.store.kind(), request_format = %config.request_format, "verifier configured");

        Ok(builder.with_session_store(store).with_clock(clock))
    }

    /// Set the deployment origin. Callback and client URLs are derived from it.
    pub fn with_origin(mut self, origin: BaseUrl) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Path of the wallet callback under the origin.
    pub fn with_callback_path(mut self, path: &str) -> Self {
        self.callback_path = path.to_owned();
        self
    }

    pub fn with_request_format(mut self, format: RequestFormat) -> Self {
        self.request_format = format;
        self
    }

    /// Override the claims query style that goes with the request format.
    pub fn with_claims_query(mut self, style: ClaimsQueryStyle) -> Self {
        self.claims_query = Some(style);
        self
    }

    /// Set the key that signs request objects. Required by the signed request formats.
    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner + Send + Sync>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Set the [SessionStore] the [Verifier] keeps sessions in. Defaults to a [MemoryStore].
    pub fn with_session_store(mut self, session_store: Arc<dyn SessionStore>) -> Self {
        self.session_store = Some(session_store);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set how wallet presentations are authenticated.
    pub fn with_verification_options(mut self, options: VerificationOptions) -> Self {
        self.verification_options = options;
        self
    }

    pub fn with_client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    /// `vct` of the PID credential requested by DCQL queries.
    pub fn with_pid_vct(mut self, vct: impl Into<String>) -> Self {
        self.pid_vct = vct.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        authorization_request::parameters::State, response::VpToken, util::FixedClock,
    };
    use chrono::{TimeZone, Utc};
    use std::str::FromStr;

    fn mint(iss: &str, subject: serde_json::Value) -> String {
        let payload = serde_json::json!({
            "iss": iss,
            "vp": { "verifiableCredential": [{ "credentialSubject": subject }] },
        });
        client::make_unsigned_jwt(&payload).unwrap()
    }

    fn verifier() -> (Verifier, FixedClock) {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 14, 12, 0, 0).unwrap());
        let verifier = Verifier::builder()
            .with_origin(BaseUrl::from_str("https://rp.example").unwrap())
            .with_clock(Arc::new(clock.clone()))
            .with_verification_options(VerificationOptions {
                skip_signature_verification: true,
                ..Default::default()
            })
            .build()
            .unwrap();
        (verifier, clock)
    }

    fn post(token: String, session_id: Uuid) -> AuthorizationResponse {
        AuthorizationResponse::new(VpToken::Single(token), State(session_id.to_string())).unwrap()
    }

    #[tokio::test]
    async fn completed_once_then_gone() {
        let (verifier, _) = verifier();
        let session = verifier.create_session(None).await.unwrap();
        assert_eq!(session.min_age, DEFAULT_MIN_AGE);

        let accepted = verifier
            .handle_callback(post(
                mint(
                    presentation::DEFAULT_TRUSTED_ISSUER,
                    serde_json::json!({ "age_over_18": true }),
                ),
                session.session_id,
            ))
            .await
            .unwrap();
        assert_eq!(accepted.status, "success");
        assert_eq!(
            accepted.redirect_uri,
            format!("https://rp.example?session={}", session.session_id)
        );

        let view = verifier.poll_status(session.session_id).await.unwrap();
        assert_eq!(view.status, SessionStatus::Completed);
        assert!(view.result.unwrap().is_old_enough);

        assert!(matches!(
            verifier.poll_status(session.session_id).await,
            Err(VerifierError::NotFound)
        ));
    }

    #[tokio::test]
    async fn pending_poll_keeps_session() {
        let (verifier, _) = verifier();
        let session = verifier.create_session(Some(21)).await.unwrap();
        for _ in 0..2 {
            let view = verifier.poll_status(session.session_id).await.unwrap();
            assert_eq!(view.status, SessionStatus::Pending);
        }
    }

    #[tokio::test]
    async fn underage_fails_with_generic_message() {
        let (verifier, _) = verifier();
        let session = verifier.create_session(Some(21)).await.unwrap();
        let err = verifier
            .handle_callback(post(
                mint(
                    presentation::DEFAULT_TRUSTED_ISSUER,
                    serde_json::json!({ "birthdate": "2005-01-01" }),
                ),
                session.session_id,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, VerifierError::Verification(_)));
        assert_eq!(err.to_body().error, AGE_VERIFICATION_FAILED);

        let view = verifier.poll_status(session.session_id).await.unwrap();
        assert_eq!(view.status, SessionStatus::Failed);
        assert_eq!(view.error.as_deref(), Some(AGE_VERIFICATION_FAILED));
        assert_eq!(view.result, None);
    }

    #[tokio::test]
    async fn bad_state_is_invalid_input() {
        let (verifier, _) = verifier();
        let err = verifier
            .handle_callback(
                AuthorizationResponse::new(
                    VpToken::Single("a.b.c".into()),
                    State("not-a-uuid".into()),
                )
                .unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, VerifierError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn missing_verification_mode_is_configuration() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 6, 14, 12, 0, 0).unwrap());
        let verifier = Verifier::builder()
            .with_origin(BaseUrl::from_str("https://rp.example").unwrap())
            .with_clock(Arc::new(clock))
            .build()
            .unwrap();
        let session = verifier.create_session(Some(18)).await.unwrap();
        let token = mint(
            presentation::DEFAULT_TRUSTED_ISSUER,
            serde_json::json!({ "age_over_18": true }),
        );

        let err = verifier
            .handle_callback(post(token.clone(), session.session_id))
            .await
            .unwrap_err();
        assert!(matches!(err, VerifierError::Configuration(_)));
        assert!(matches!(
            verifier.verify_age(&token, 18),
            Err(VerifierError::Configuration(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn default_store_reclaims_abandoned_sessions() {
        let (verifier, clock) = verifier();
        for _ in 0..3 {
            verifier.create_session(None).await.unwrap();
        }
        let store = verifier._sweeper.as_ref().unwrap().store().clone();
        assert_eq!(store.len().await, 3);

        // Nobody reads these sessions again.
        clock.advance(chrono::Duration::seconds(601));
        tokio::time::sleep(DEFAULT_SWEEP_INTERVAL + std::time::Duration::from_secs(1)).await;
        assert!(store.is_empty().await);
    }

    #[test]
    fn default_store_outside_a_runtime_has_no_sweeper() {
        let verifier = Verifier::builder()
            .with_origin(BaseUrl::from_str("https://rp.example").unwrap())
            .build()
            .unwrap();
        assert!(verifier._sweeper.is_none());
    }

    #[test]
    fn signed_format_requires_signer() {
        let err = Verifier::builder()
            .with_origin(BaseUrl::from_str("https://rp.example").unwrap())
            .with_request_format(RequestFormat::SignedJwtRfc9101)
            .build()
            .unwrap_err();
        assert!(matches!(err, VerifierError::Configuration(_)));

        let err = Verifier::builder().build().unwrap_err();
        assert!(matches!(err, VerifierError::Configuration(_)));
    }

    #[tokio::test]
    async fn from_config_wires_memory_store() {
        let mut config = VerifierConfig::new(BaseUrl::from_str("https://rp.example/app").unwrap());
        config.skip_signature_verification = true;
        config.trusted_issuers = vec!["did:example:other".into()];

        let verifier = VerifierBuilder::from_config(&config)
            .await
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            verifier.callback().as_str(),
            "https://rp.example/app/api/eudi/callback"
        );

        let result = verifier
            .verify_age(
                &mint("did:example:other", serde_json::json!({ "age": 30 })),
                18,
            )
            .unwrap();
        assert!(result.is_old_enough);

        config.request_format = RequestFormat::SignedJwtRedirectUri;
        assert!(matches!(
            VerifierBuilder::from_config(&config).await,
            Err(VerifierError::Configuration(_))
        ));
    }
}
