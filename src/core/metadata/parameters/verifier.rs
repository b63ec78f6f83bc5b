use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::core::{
    credential_format::{ClaimFormatDesignation, ClaimFormatMap},
    object::TypedParameter,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientName(pub String);

impl TypedParameter for ClientName {
    const KEY: &'static str = "client_name";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientUri(pub Url);

impl TypedParameter for ClientUri {
    const KEY: &'static str = "client_uri";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RedirectUris(pub Vec<Url>);

impl TypedParameter for RedirectUris {
    const KEY: &'static str = "redirect_uris";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VpFormats(pub ClaimFormatMap);

impl TypedParameter for VpFormats {
    const KEY: &'static str = "vp_formats";
}

impl VpFormats {
    /// SD-JWT VC under both media types, issuer and key-binding JWTs signed with ES256.
    pub fn sd_jwt_es256() -> Self {
        let algs = json!({
            "sd-jwt_alg_values": ["ES256"],
            "kb-jwt_alg_values": ["ES256"],
        });
        let mut formats = ClaimFormatMap::new();
        formats.insert(ClaimFormatDesignation::VcSdJwt, algs.clone());
        formats.insert(ClaimFormatDesignation::DcSdJwt, algs);
        Self(formats)
    }
}
