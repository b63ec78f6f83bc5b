use std::ops::Deref;

use anyhow::{Error, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use self::parameters::verifier::{ClientName, ClientUri, RedirectUris, VpFormats};

use super::{
    authorization_request::parameters::ClientMetadata,
    object::{ParsingErrorContext, UntypedObject},
};

pub mod parameters;

/// Verifier metadata sent by value in every authorization request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "UntypedObject", into = "UntypedObject")]
pub struct VerifierMetadata(UntypedObject, ClientName, VpFormats);

impl VerifierMetadata {
    /// Metadata for a redirect_uri client hosted at `client_uri` that receives responses at
    /// `callback`.
    pub fn for_verifier(name: &str, client_uri: Url, callback: Url) -> Result<Self> {
        let object = UntypedObject::new()
            .with(ClientName(name.to_owned()))?
            .with(ClientUri(client_uri))?
            .with(RedirectUris(vec![callback]))?
            .with(VpFormats::sd_jwt_es256())?;
        object.try_into()
    }

    pub fn client_name(&self) -> &ClientName {
        &self.1
    }

    pub fn vp_formats(&self) -> &VpFormats {
        &self.2
    }

    pub fn into_parameter(self) -> ClientMetadata {
        ClientMetadata(self.0)
    }
}

impl From<VerifierMetadata> for UntypedObject {
    fn from(value: VerifierMetadata) -> Self {
        value.0
    }
}

impl TryFrom<UntypedObject> for VerifierMetadata {
    type Error = Error;

    fn try_from(value: UntypedObject) -> Result<Self, Self::Error> {
        let client_name = value.get().parsing_error()?;
        let vp_formats = value.get().parsing_error()?;
        Ok(Self(value, client_name, vp_formats))
    }
}

impl Deref for VerifierMetadata {
    type Target = UntypedObject;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn verifier_metadata_shape() {
        let metadata = VerifierMetadata::for_verifier(
            "Next EUDI Verifier",
            "https://rp.example/".parse().unwrap(),
            "https://rp.example/api/eudi/callback".parse().unwrap(),
        )
        .unwrap();

        assert_eq!(
            serde_json::to_value(&metadata).unwrap(),
            json!({
                "client_name": "Next EUDI Verifier",
                "client_uri": "https://rp.example/",
                "redirect_uris": ["https://rp.example/api/eudi/callback"],
                "vp_formats": {
                    "dc+sd-jwt": {
                        "sd-jwt_alg_values": ["ES256"],
                        "kb-jwt_alg_values": ["ES256"],
                    },
                    "vc+sd-jwt": {
                        "sd-jwt_alg_values": ["ES256"],
                        "kb-jwt_alg_values": ["ES256"],
                    },
                }
            })
        );
    }

    #[test]
    fn rejects_metadata_without_formats() {
        let object: UntypedObject =
            serde_json::from_value(json!({ "client_name": "rp" })).unwrap();
        assert!(VerifierMetadata::try_from(object).is_err());
    }
}
