use std::{fmt, str::FromStr};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{error, info};
use uuid::Uuid;

use crate::core::{
    authorization_request::{
        parameters::{
            Audience, ClientId, Expiry, IssuedAt, Issuer, Nonce, RedirectUri, ResponseMode,
            ResponseType, ResponseUri, State, WalletNonce,
        },
        AuthorizationRequestObject,
    },
    dcql_query::DcqlQuery,
    metadata::VerifierMetadata,
    object::UntypedObject,
    presentation_definition::PresentationDefinition,
    util::random_nonce,
};

use super::{client::make_unsigned_jwt, error::VerifierError, session::Session, Verifier};

/// Lifetime of a JWT-encoded request object, in seconds.
const REQUEST_OBJECT_LIFETIME: i64 = 3600;

/// The shape of the authorization request handed to the wallet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestFormat {
    /// Presentation-Exchange request as a JSON document, without `client_id_scheme`.
    Plain,
    /// `alg: none` request object.
    #[default]
    UnsignedJwt,
    /// ES256 request object under the `redirect_uri` client identifier scheme.
    SignedJwtRedirectUri,
    /// ES256 request object carrying `iss` and `aud` (RFC 9101).
    SignedJwtRfc9101,
}

impl RequestFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            RequestFormat::Plain => "application/json",
            RequestFormat::UnsignedJwt => "application/jwt",
            RequestFormat::SignedJwtRedirectUri | RequestFormat::SignedJwtRfc9101 => {
                "application/oauth-authz-req+jwt"
            }
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            RequestFormat::SignedJwtRedirectUri | RequestFormat::SignedJwtRfc9101
        )
    }

    /// Claims query used when the deployment does not pick one.
    pub fn default_claims_query(&self) -> ClaimsQueryStyle {
        match self {
            RequestFormat::Plain => ClaimsQueryStyle::AgeOverPredicate,
            _ => ClaimsQueryStyle::Dcql,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            RequestFormat::Plain => "plain",
            RequestFormat::UnsignedJwt => "unsigned_jwt",
            RequestFormat::SignedJwtRedirectUri => "signed_jwt_redirect_uri",
            RequestFormat::SignedJwtRfc9101 => "signed_jwt_rfc9101",
        }
    }
}

impl fmt::Display for RequestFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl FromStr for RequestFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "plain" => RequestFormat::Plain,
            "unsigned_jwt" => RequestFormat::UnsignedJwt,
            "signed_jwt_redirect_uri" => RequestFormat::SignedJwtRedirectUri,
            "signed_jwt_rfc9101" => RequestFormat::SignedJwtRfc9101,
            other => bail!("unknown request format '{other}'"),
        })
    }
}

/// How the request names the claims it needs. One style per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimsQueryStyle {
    /// DCQL query for an SD-JWT PID with `birthdate`.
    Dcql,
    /// Presentation definition asking for the mdoc attribute `age_over_<minAge>`.
    AgeOverPredicate,
    /// Presentation definition asking for a numeric `age` of at least `minAge`.
    MinimumAge,
}

impl FromStr for ClaimsQueryStyle {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "dcql" => ClaimsQueryStyle::Dcql,
            "age_over" | "age_over_predicate" => ClaimsQueryStyle::AgeOverPredicate,
            "minimum_age" => ClaimsQueryStyle::MinimumAge,
            other => bail!("unknown claims query style '{other}'"),
        })
    }
}

/// An authorization request ready to be served to the wallet.
#[derive(Debug, Clone)]
pub struct AuthorizationRequestEnvelope {
    pub format: RequestFormat,
    /// `Content-Type` of `body`.
    pub content_type: &'static str,
    pub body: String,
    /// The request payload, as the wallet will read it.
    pub object: AuthorizationRequestObject,
}

#[derive(Debug, Clone)]
#[must_use]
pub struct RequestBuilder<'a> {
    session_id: Uuid,
    wallet_nonce: Option<String>,
    verifier: &'a Verifier,
}

impl<'a> RequestBuilder<'a> {
    pub(crate) fn new(verifier: &'a Verifier, session_id: Uuid) -> Self {
        Self {
            session_id,
            wallet_nonce: None,
            verifier,
        }
    }

    /// Nonce the wallet sent along with its request fetch. Blank values are ignored.
    pub fn with_wallet_nonce(mut self, wallet_nonce: Option<String>) -> Self {
        self.wallet_nonce = wallet_nonce.filter(|n| !n.trim().is_empty());
        self
    }

    /// Build the request for a live session. Reading the request does not change the session.
    pub async fn build(self) -> Result<AuthorizationRequestEnvelope, VerifierError> {
        let format = self.verifier.request_format;
        if format.is_signed() && !self.verifier.client.can_sign() {
            error!(%format, "signed request format configured without a signing key");
            return Err(VerifierError::Configuration(format!(
                "request format '{format}' requires a signing key"
            )));
        }

        let session = self
            .verifier
            .sessions
            .get_session(self.session_id)
            .await?
            .ok_or(VerifierError::NotFound)?;

        let object = self.assemble(&session)?;
        let body = match format {
            RequestFormat::Plain => serde_json::to_string(&object)
                .context("unable to serialize authorization request")?,
            RequestFormat::UnsignedJwt => make_unsigned_jwt(&object)?,
            RequestFormat::SignedJwtRedirectUri | RequestFormat::SignedJwtRfc9101 => {
                let payload = Json::from(UntypedObject::from(object.clone()));
                self.verifier
                    .client
                    .generate_request_object_jwt(&payload)
                    .await?
            }
        };

        info!(session_id = %session.session_id, %format, "authorization request built");

        Ok(AuthorizationRequestEnvelope {
            format,
            content_type: format.content_type(),
            body,
            object,
        })
    }

    /// The request fields shared by every format, plus the per-format identity fields.
    fn assemble(&self, session: &Session) -> Result<AuthorizationRequestObject> {
        let verifier = self.verifier;
        let format = verifier.request_format;
        let callback = verifier.callback.clone();
        let client = verifier.client.as_ref();

        let nonce = match (&self.wallet_nonce, format.is_signed()) {
            (Some(wallet_nonce), _) => wallet_nonce.clone(),
            (None, false) => session.session_id.to_string(),
            (None, true) => random_nonce(),
        };

        let metadata = VerifierMetadata::for_verifier(
            &verifier.client_name,
            verifier.origin.as_url().clone(),
            callback.clone(),
        )?;

        let mut object = UntypedObject::new()
            .with(ResponseType::VpToken)?
            .with(ResponseMode::DirectPost)?
            .with(ResponseUri(callback.clone()))?
            .with(Nonce(nonce))?
            .with(State(session.session_id.to_string()))?
            .with(metadata.into_parameter())?;

        if let Some(wallet_nonce) = &self.wallet_nonce {
            object.insert(WalletNonce(wallet_nonce.clone()))?;
        }

        match verifier.claims_query {
            ClaimsQueryStyle::Dcql => object.insert(DcqlQuery::pid_sd_jwt(&verifier.pid_vct))?,
            ClaimsQueryStyle::AgeOverPredicate => {
                object.insert(PresentationDefinition::age_over(session.min_age))?
            }
            ClaimsQueryStyle::MinimumAge => {
                object.insert(PresentationDefinition::minimum_age(session.min_age))?
            }
        }

        if format == RequestFormat::Plain {
            object.insert(ClientId(callback.to_string()))?;
        } else {
            let iat = verifier.clock.now().timestamp();
            object.insert(client.id().clone())?;
            object.insert(client.scheme().clone())?;
            object.insert(RedirectUri(callback))?;
            object.insert(IssuedAt(iat))?;
            object.insert(Expiry(iat + REQUEST_OBJECT_LIFETIME))?;
            match format {
                RequestFormat::UnsignedJwt => {
                    object.insert(Issuer(verifier.origin.origin_string()))?;
                    object.insert(Audience::self_issued())?;
                }
                RequestFormat::SignedJwtRfc9101 => {
                    object.insert(Issuer(client.id().0.clone()))?;
                    object.insert(Audience::self_issued())?;
                }
                _ => {}
            }
        }

        object.try_into().context(
            "unable to construct the Authorization Request from provided request parameters",
        )
    }
}
