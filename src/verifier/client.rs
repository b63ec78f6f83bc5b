use std::{fmt::Debug, sync::Arc};

use anyhow::{bail, Result};
use async_trait::async_trait;
use base64::prelude::*;
use serde::Serialize;
use serde_json::{json, Value as Json};
use url::Url;

use crate::{
    core::authorization_request::parameters::{ClientId, ClientIdScheme},
    utils::encode_segment,
};

use super::request_signer::RequestSigner;

/// `typ` of a signed request object.
pub const REQUEST_OBJECT_TYP: &str = "oauth-authz-req+jwt";

/// How the verifier identifies itself to the wallet, and how it wraps request objects.
#[async_trait]
pub trait Client: Debug {
    fn id(&self) -> &ClientId;

    fn scheme(&self) -> &ClientIdScheme;

    /// Whether [generate_request_object_jwt](Self::generate_request_object_jwt) can succeed.
    fn can_sign(&self) -> bool;

    async fn generate_request_object_jwt(&self, body: &Json) -> Result<String>;
}

/// A [Client] with the `redirect_uri` Client Identifier: the client id is the URL the wallet
/// posts its response to.
#[derive(Debug, Clone)]
pub struct RedirectUriClient {
    id: ClientId,
    callback: Url,
    signer: Option<Arc<dyn RequestSigner + Send + Sync>>,
}

impl RedirectUriClient {
    pub fn new(callback: Url) -> Self {
        Self {
            id: ClientId(format!("redirect_uri:{callback}")),
            callback,
            signer: None,
        }
    }

    /// Sign request objects with `signer`.
    pub fn with_signer(mut self, signer: Arc<dyn RequestSigner + Send + Sync>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn callback(&self) -> &Url {
        &self.callback
    }
}

#[async_trait]
impl Client for RedirectUriClient {
    fn id(&self) -> &ClientId {
        &self.id
    }

    fn scheme(&self) -> &ClientIdScheme {
        &ClientIdScheme::RedirectUri
    }

    fn can_sign(&self) -> bool {
        self.signer.is_some()
    }

    async fn generate_request_object_jwt(&self, body: &Json) -> Result<String> {
        let Some(signer) = &self.signer else {
            bail!("no signing key is configured for '{}'", self.id.0)
        };
        let header = json!({
            "alg": signer.alg(),
            "typ": REQUEST_OBJECT_TYP,
            "jwk": signer.jwk(),
        });
        make_jwt(header, body, signer.as_ref()).await
    }
}

/// Encode `body` as an unsecured JWT (`alg: none`) with an empty signature segment.
pub fn make_unsigned_jwt<T: Serialize + ?Sized>(body: &T) -> Result<String> {
    let header_b64 = encode_segment(&json!({ "alg": "none", "typ": "JWT" }))?;
    let body_b64 = encode_segment(body)?;
    Ok(format!("{header_b64}.{body_b64}."))
}

async fn make_jwt<S: RequestSigner + ?Sized>(
    header: Json,
    body: &Json,
    signer: &S,
) -> Result<String> {
    let header_b64 = encode_segment(&header)?;
    let body_b64 = encode_segment(body)?;
    let payload = [header_b64.as_bytes(), b".", body_b64.as_bytes()].concat();
    let signature = signer.sign(&payload).await;
    let signature_b64 = BASE64_URL_SAFE_NO_PAD.encode(signature);
    Ok(format!("{header_b64}.{body_b64}.{signature_b64}"))
}
