use core::fmt;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

const FORMAT_DC_SD_JWT: &str = "dc+sd-jwt";
const FORMAT_VC_SD_JWT: &str = "vc+sd-jwt";
const FORMAT_MSO_MDOC: &str = "mso_mdoc";
const FORMAT_JWT_VC_JSON: &str = "jwt_vc_json";
const FORMAT_JWT_VP_JSON: &str = "jwt_vp_json";

/// A JSON object keyed by claim format, e.g. `vp_formats` in client metadata or `format` in a
/// presentation definition. Ordered so serialized requests are stable.
pub type ClaimFormatMap = BTreeMap<ClaimFormatDesignation, Json>;

/// Credential format identifiers referenced by authorization requests.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ClaimFormatDesignation {
    /// IETF SD-JWT VC, current media type.
    DcSdJwt,
    /// IETF SD-JWT VC, legacy media type still sent by some wallets.
    VcSdJwt,
    /// ISO/IEC 18013-5 mobile document.
    MsoMDoc,
    JwtVcJson,
    JwtVpJson,
    Other(String),
}

impl From<String> for ClaimFormatDesignation {
    fn from(s: String) -> Self {
        match s.as_str() {
            FORMAT_DC_SD_JWT => Self::DcSdJwt,
            FORMAT_VC_SD_JWT => Self::VcSdJwt,
            FORMAT_MSO_MDOC => Self::MsoMDoc,
            FORMAT_JWT_VC_JSON => Self::JwtVcJson,
            FORMAT_JWT_VP_JSON => Self::JwtVpJson,
            _ => Self::Other(s),
        }
    }
}

impl From<ClaimFormatDesignation> for String {
    fn from(format: ClaimFormatDesignation) -> Self {
        match format {
            ClaimFormatDesignation::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl ClaimFormatDesignation {
    pub fn as_str(&self) -> &str {
        match self {
            Self::DcSdJwt => FORMAT_DC_SD_JWT,
            Self::VcSdJwt => FORMAT_VC_SD_JWT,
            Self::MsoMDoc => FORMAT_MSO_MDOC,
            Self::JwtVcJson => FORMAT_JWT_VC_JSON,
            Self::JwtVpJson => FORMAT_JWT_VP_JSON,
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for ClaimFormatDesignation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}
