use std::ops::Deref;

use anyhow::{bail, Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use self::parameters::{
    ClientId, ClientIdScheme, ClientMetadata, Nonce, ResponseMode, ResponseType, ResponseUri,
    State, WalletNonce,
};

use super::{
    dcql_query::DcqlQuery,
    object::{ParsingErrorContext, UntypedObject},
    presentation_definition::PresentationDefinition,
};

pub mod parameters;

/// A validated authorization request payload.
///
/// The full object is kept so that optional fields (`iss`, `aud`, `iat`, `exp`, ...) remain
/// available through [Deref] to [UntypedObject]; the fields every request must carry are parsed
/// once up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "UntypedObject", into = "UntypedObject")]
pub struct AuthorizationRequestObject(
    UntypedObject,
    ClientId,
    ResponseType,
    ResponseMode,
    Url,
    ClaimsQuery,
    Nonce,
    State,
);

/// How the verifier expresses the credential claims it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimsQuery {
    Dcql(DcqlQuery),
    PresentationDefinition(PresentationDefinition),
}

impl AuthorizationRequestObject {
    pub fn client_id(&self) -> &ClientId {
        &self.1
    }

    /// Absent in plain Presentation-Exchange requests.
    pub fn client_id_scheme(&self) -> Option<ClientIdScheme> {
        self.0.get().and_then(Result::ok)
    }

    pub fn response_type(&self) -> &ResponseType {
        &self.2
    }

    pub fn response_mode(&self) -> &ResponseMode {
        &self.3
    }

    /// Uri the wallet posts its response to.
    pub fn response_uri(&self) -> &Url {
        &self.4
    }

    pub fn claims_query(&self) -> &ClaimsQuery {
        &self.5
    }

    pub fn nonce(&self) -> &Nonce {
        &self.6
    }

    pub fn state(&self) -> &State {
        &self.7
    }

    pub fn wallet_nonce(&self) -> Option<WalletNonce> {
        self.0.get().and_then(Result::ok)
    }

    /// Return the `client_metadata` field from the authorization request.
    pub fn client_metadata(&self) -> Result<ClientMetadata> {
        self.0.get().parsing_error()
    }
}

impl From<AuthorizationRequestObject> for UntypedObject {
    fn from(value: AuthorizationRequestObject) -> Self {
        value.0
    }
}

impl TryFrom<UntypedObject> for AuthorizationRequestObject {
    type Error = Error;

    fn try_from(value: UntypedObject) -> std::result::Result<Self, Self::Error> {
        let client_id = value.get().parsing_error()?;
        let response_type = value.get().parsing_error()?;

        let response_uri = match value.get::<ResponseMode>().parsing_error()? {
            ResponseMode::DirectPost => value.get::<ResponseUri>().parsing_error()?.0,
            response_mode => {
                bail!(
                    "this 'response_mode' ({}) is not currently supported",
                    String::from(response_mode)
                )
            }
        };

        let claims_query = match (
            value.get::<DcqlQuery>(),
            value.get::<PresentationDefinition>(),
        ) {
            (None, None) => bail!("one of 'dcql_query' and 'presentation_definition' is required"),
            (Some(_), Some(_)) => {
                bail!("'dcql_query' and 'presentation_definition' are mutually exclusive")
            }
            (Some(dcql), None) => ClaimsQuery::Dcql(dcql.parsing_error()?),
            (None, Some(pd)) => ClaimsQuery::PresentationDefinition(pd.parsing_error()?),
        };

        let nonce = value.get().parsing_error()?;
        let state = value.get().parsing_error()?;

        Ok(Self(
            value,
            client_id,
            response_type,
            ResponseMode::DirectPost,
            response_uri,
            claims_query,
            nonce,
            state,
        ))
    }
}

impl Deref for AuthorizationRequestObject {
    type Target = UntypedObject;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn request(extra: serde_json::Value) -> serde_json::Value {
        let mut base = json!({
            "client_id": "redirect_uri:https://rp.example/api/eudi/callback",
            "client_id_scheme": "redirect_uri",
            "response_type": "vp_token",
            "response_mode": "direct_post",
            "response_uri": "https://rp.example/api/eudi/callback",
            "nonce": "n-0S6_WzA2Mj",
            "state": "af0ifjsldkj",
        });
        for (k, v) in extra.as_object().unwrap() {
            base[k] = v.clone();
        }
        base
    }

    #[test]
    fn parses_dcql_request() {
        let query = serde_json::to_value(DcqlQuery::pid_sd_jwt("urn:pid")).unwrap();
        let aro: AuthorizationRequestObject =
            serde_json::from_value(request(json!({ "dcql_query": query }))).unwrap();

        assert_eq!(aro.client_id_scheme(), Some(ClientIdScheme::RedirectUri));
        assert_eq!(aro.state().0, "af0ifjsldkj");
        assert_eq!(
            aro.response_uri().as_str(),
            "https://rp.example/api/eudi/callback"
        );
        assert!(matches!(aro.claims_query(), ClaimsQuery::Dcql(_)));
        assert!(aro.wallet_nonce().is_none());
    }

    #[test]
    fn requires_exactly_one_claims_query() {
        let missing = serde_json::from_value::<AuthorizationRequestObject>(request(json!({})));
        assert!(missing.is_err());

        let both = serde_json::from_value::<AuthorizationRequestObject>(request(json!({
            "dcql_query": DcqlQuery::pid_sd_jwt("urn:pid"),
            "presentation_definition": PresentationDefinition::minimum_age(18),
        })));
        assert!(both.is_err());
    }

    #[test]
    fn direct_post_requires_response_uri() {
        let mut value = request(json!({
            "presentation_definition": PresentationDefinition::minimum_age(18),
        }));
        value.as_object_mut().unwrap().remove("response_uri");
        assert!(serde_json::from_value::<AuthorizationRequestObject>(value).is_err());
    }
}
