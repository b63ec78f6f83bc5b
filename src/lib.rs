//! This library provides the relying-party side of an [OID4VP 1.0] age check against an EUDI
//! wallet.
//!
//! [OID4VP 1.0]: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html>
//!
//! # Verifier Usage
//!
//! ```ignore
//! use eudi_age_verifier::config::VerifierConfig;
//! use eudi_age_verifier::core::response::AuthorizationResponse;
//! use eudi_age_verifier::verifier::VerifierBuilder;
//!
//! // Setup verifier.
//! let config = VerifierConfig::from_env()?;
//! let verifier = VerifierBuilder::from_config(&config).await?.build()?;
//!
//! // The browser asks for a session and renders a QR code pointing at the request.
//! let session = verifier.create_session(Some(18)).await?;
//! let created = session.created();
//!
//! // The wallet fetches the authorization request.
//! let request = verifier
//!     .build_authorization_request(session.session_id)
//!     .with_wallet_nonce(wallet_nonce)
//!     .build()
//!     .await?;
//! respond(request.content_type, request.body);
//!
//! // The wallet posts its presentation to the callback.
//! let response = AuthorizationResponse::from_x_www_form_urlencoded(&body)?;
//! let accepted = verifier.handle_callback(response).await?;
//!
//! // The browser polls until the session reaches `completed` or `failed`.
//! let status = verifier.poll_status(session.session_id).await?;
//! ```
//!
//! Errors are [`VerifierError`]s; hosting HTTP layers map them with
//! [`VerifierError::status_code`] and [`VerifierError::to_body`], which never carry
//! verification detail.
//!
//! [`VerifierError`]: crate::verifier::error::VerifierError
//! [`VerifierError::status_code`]: crate::verifier::error::VerifierError::status_code
//! [`VerifierError::to_body`]: crate::verifier::error::VerifierError::to_body
//!
//! # Protocol Overview
//!
//! ## Sessions
//!
//! A session is created `pending` with a fixed ten minute time to live that restarts on every
//! write. Its id doubles as the OpenID4VP `state`. Sessions live in a [`SessionStore`]: the
//! in-process [`MemoryStore`] or, with the `redis` feature, a Redis-backed store.
//!
//! [`SessionStore`]: crate::verifier::store::SessionStore
//! [`MemoryStore`]: crate::verifier::store::MemoryStore
//!
//! ## Authorization Request
//!
//! The [`RequestBuilder`] renders one of four request shapes, chosen per deployment by
//! [`RequestFormat`]: a plain Presentation-Exchange JSON document, an unsigned JWT, or an ES256
//! JWT under the `redirect_uri` client identifier scheme with or without RFC 9101 `iss`/`aud`.
//! Claims are requested with a DCQL query or a presentation definition ([`ClaimsQueryStyle`]).
//!
//! All the request data types live in the [`core::authorization_request`] module.
//!
//! [`RequestBuilder`]: crate::verifier::request_builder::RequestBuilder
//! [`RequestFormat`]: crate::verifier::request_builder::RequestFormat
//! [`ClaimsQueryStyle`]: crate::verifier::request_builder::ClaimsQueryStyle
//! [`core::authorization_request`]: crate::core::authorization_request
//!
//! ## Verification
//!
//! The wallet posts an [`AuthorizationResponse`]. The session moves to `scanned`, and the
//! [`PresentationVerifier`] authenticates the presentation, checks its issuer against the
//! trusted set and decides the age predicate from the first credential's subject. The session
//! then ends `completed` or `failed`; at most one outcome is ever committed per session.
//!
//! [`AuthorizationResponse`]: crate::core::response::AuthorizationResponse
//! [`PresentationVerifier`]: crate::verifier::presentation::PresentationVerifier

pub mod config;
pub mod core;
pub mod utils;
pub mod verifier;

pub use eudi_age_verifier_frontend::{
    CallbackAccepted, ErrorBody, SessionCreated, SessionResult, SessionStatus, SessionStatusView,
    CORS_ALLOW_ORIGIN,
};
