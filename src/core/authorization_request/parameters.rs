use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::object::{TypedParameter, UntypedObject};

const REDIRECT_URI: &str = "redirect_uri";
const DID: &str = "did";
const X509_SAN_DNS: &str = "x509_san_dns";

/// Audience of requests addressed to any self-issued wallet.
pub const SELF_ISSUED_AUDIENCE: &str = "https://self-issued.me/v2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub String);

impl TypedParameter for ClientId {
    const KEY: &'static str = "client_id";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClientIdScheme {
    RedirectUri,
    Did,
    X509SanDns,
    Other(String),
}

impl TypedParameter for ClientIdScheme {
    const KEY: &'static str = "client_id_scheme";
}

impl From<String> for ClientIdScheme {
    fn from(s: String) -> Self {
        match s.as_str() {
            REDIRECT_URI => ClientIdScheme::RedirectUri,
            DID => ClientIdScheme::Did,
            X509_SAN_DNS => ClientIdScheme::X509SanDns,
            _ => ClientIdScheme::Other(s),
        }
    }
}

impl From<ClientIdScheme> for String {
    fn from(cis: ClientIdScheme) -> Self {
        match cis {
            ClientIdScheme::Other(o) => o,
            known => known.to_string(),
        }
    }
}

impl fmt::Display for ClientIdScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientIdScheme::RedirectUri => REDIRECT_URI,
            ClientIdScheme::Did => DID,
            ClientIdScheme::X509SanDns => X509_SAN_DNS,
            ClientIdScheme::Other(o) => o,
        }
        .fmt(f)
    }
}

/// `client_metadata` field in the Authorization Request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientMetadata(pub UntypedObject);

impl TypedParameter for ClientMetadata {
    const KEY: &'static str = "client_metadata";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseType {
    #[serde(rename = "vp_token")]
    VpToken,
}

impl TypedParameter for ResponseType {
    const KEY: &'static str = "response_type";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResponseMode {
    /// The wallet POSTs the response to `response_uri`.
    DirectPost,
    Fragment,
    Other(String),
}

impl TypedParameter for ResponseMode {
    const KEY: &'static str = "response_mode";
}

impl From<String> for ResponseMode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "direct_post" => ResponseMode::DirectPost,
            "fragment" => ResponseMode::Fragment,
            _ => ResponseMode::Other(s),
        }
    }
}

impl From<ResponseMode> for String {
    fn from(rm: ResponseMode) -> Self {
        match rm {
            ResponseMode::DirectPost => "direct_post".into(),
            ResponseMode::Fragment => "fragment".into(),
            ResponseMode::Other(s) => s,
        }
    }
}

/// Where the wallet sends its response under `direct_post`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseUri(pub Url);

impl TypedParameter for ResponseUri {
    const KEY: &'static str = "response_uri";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RedirectUri(pub Url);

impl TypedParameter for RedirectUri {
    const KEY: &'static str = "redirect_uri";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nonce(pub String);

impl TypedParameter for Nonce {
    const KEY: &'static str = "nonce";
}

impl From<String> for Nonce {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Nonce supplied by the wallet when it fetched the request, echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletNonce(pub String);

impl TypedParameter for WalletNonce {
    const KEY: &'static str = "wallet_nonce";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(pub String);

impl TypedParameter for State {
    const KEY: &'static str = "state";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Issuer(pub String);

impl TypedParameter for Issuer {
    const KEY: &'static str = "iss";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Audience(pub String);

impl TypedParameter for Audience {
    const KEY: &'static str = "aud";
}

impl Audience {
    pub fn self_issued() -> Self {
        Self(SELF_ISSUED_AUDIENCE.into())
    }
}

/// Seconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssuedAt(pub i64);

impl TypedParameter for IssuedAt {
    const KEY: &'static str = "iat";
}

/// Seconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expiry(pub i64);

impl TypedParameter for Expiry {
    const KEY: &'static str = "exp";
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_id_scheme_strings() {
        let object: UntypedObject = serde_json::from_value(json!({
            "client_id_scheme": "redirect_uri",
            "response_mode": "direct_post",
            "response_type": "vp_token",
        }))
        .unwrap();

        assert_eq!(
            object.get::<ClientIdScheme>().unwrap().unwrap(),
            ClientIdScheme::RedirectUri
        );
        assert_eq!(
            object.get::<ResponseMode>().unwrap().unwrap(),
            ResponseMode::DirectPost
        );
        assert_eq!(
            object.get::<ResponseType>().unwrap().unwrap(),
            ResponseType::VpToken
        );
        assert_eq!(
            String::from(ClientIdScheme::Other("verifier_attestation".into())),
            "verifier_attestation"
        );
    }

    #[test]
    fn response_type_rejects_unknown() {
        let object: UntypedObject =
            serde_json::from_value(json!({ "response_type": "code" })).unwrap();
        assert!(object.get::<ResponseType>().unwrap().is_err());
    }
}
