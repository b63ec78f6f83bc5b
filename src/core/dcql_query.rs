use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::{
    core::{credential_format::ClaimFormatDesignation, object::TypedParameter},
    utils::NonEmptyVec,
};

/// Credential type requested from EUDI PID issuers that expose SD-JWT VCs.
pub const DEFAULT_PID_VCT: &str = "https://pidissuer.demo.connector.lissi.io/pid";

/// Claims requested from a PID credential, as `(id, path)` pairs.
const PID_CLAIMS: &[(&str, &[&str])] = &[
    ("given_name", &["given_name"]),
    ("family_name", &["family_name"]),
    ("birthdate", &["birthdate"]),
    ("address-street_address", &["address", "street_address"]),
    ("address-locality", &["address", "locality"]),
    ("address-postal_code", &["address", "postal_code"]),
    ("address-country", &["address", "country"]),
];

/// A Digital Credentials Query.
/// See: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6>
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DcqlQuery {
    credentials: NonEmptyVec<DcqlCredentialQuery>,
}

impl DcqlQuery {
    pub fn new(credentials: NonEmptyVec<DcqlCredentialQuery>) -> Self {
        Self { credentials }
    }

    /// Query for a single SD-JWT PID carrying the identity and address claims needed to
    /// derive an age decision from `birthdate`.
    pub fn pid_sd_jwt(vct: &str) -> Self {
        let mut query =
            DcqlCredentialQuery::new("sd-jwt-pid".into(), ClaimFormatDesignation::DcSdJwt);
        query
            .meta
            .insert("vct_values".into(), Json::Array(vec![vct.into()]));
        for (id, path) in PID_CLAIMS {
            let claim = DcqlCredentialClaimsQuery::new(
                Some(id.to_string()),
                NonEmptyVec::new(path[0].to_string()),
            )
            .with_path_tail(&path[1..]);
            query.add_claim(claim);
        }
        Self::new(NonEmptyVec::new(query))
    }

    pub fn credentials(&self) -> &[DcqlCredentialQuery] {
        &self.credentials
    }
}

impl TypedParameter for DcqlQuery {
    const KEY: &'static str = "dcql_query";
}

/// A Credential Query object.
/// See: <https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#section-6.1>
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DcqlCredentialQuery {
    id: String,
    format: ClaimFormatDesignation,
    /// Format-specific constraints, e.g. `vct_values` for SD-JWT VC.
    #[serde(default)]
    meta: Map<String, Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    claims: Option<NonEmptyVec<DcqlCredentialClaimsQuery>>,
}

impl DcqlCredentialQuery {
    pub fn new(id: String, format: ClaimFormatDesignation) -> Self {
        Self {
            id,
            format,
            meta: Map::new(),
            claims: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn format(&self) -> &ClaimFormatDesignation {
        &self.format
    }

    pub fn meta(&self) -> &Map<String, Json> {
        &self.meta
    }

    pub fn claims(&self) -> Option<&NonEmptyVec<DcqlCredentialClaimsQuery>> {
        self.claims.as_ref()
    }

    pub fn add_claim(&mut self, claim: DcqlCredentialClaimsQuery) {
        match &mut self.claims {
            Some(claims) => claims.push(claim),
            None => self.claims = Some(NonEmptyVec::new(claim)),
        }
    }
}

/// A Claims Query object. `path` points into the credential's claim structure.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DcqlCredentialClaimsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    path: NonEmptyVec<String>,
}

impl DcqlCredentialClaimsQuery {
    pub fn new(id: Option<String>, path: NonEmptyVec<String>) -> Self {
        Self { id, path }
    }

    fn with_path_tail(mut self, tail: &[&str]) -> Self {
        for segment in tail {
            self.path.push(segment.to_string());
        }
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }
}
