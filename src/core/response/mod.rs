use anyhow::{bail, Context, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

pub use crate::core::authorization_request::parameters::State;

use super::object::{ParsingErrorContext, TypedParameter, UntypedObject};

/// The wallet's reply to a `direct_post` authorization request.
#[derive(Debug, Clone)]
pub struct AuthorizationResponse(UntypedObject, VpToken, State);

impl AuthorizationResponse {
    pub fn new(vp_token: VpToken, state: State) -> Result<Self> {
        UntypedObject::new()
            .with(vp_token)?
            .with(state)?
            .try_into()
    }

    /// Parse a JSON request body.
    pub fn from_json(body: &[u8]) -> Result<Self> {
        let object: UntypedObject =
            serde_json::from_slice(body).context("response body is not a JSON object")?;
        object.try_into()
    }

    /// Parse an `application/x-www-form-urlencoded` request body.
    ///
    /// Form values that hold JSON arrays or objects (a `vp_token` keyed by query id, say) are
    /// decoded as JSON; everything else stays a string.
    pub fn from_x_www_form_urlencoded(body: &[u8]) -> Result<Self> {
        let pairs: Vec<(String, String)> =
            serde_urlencoded::from_bytes(body).context("response body is not form encoded")?;
        let mut map = Map::new();
        for (key, value) in pairs {
            let value = match value.trim_start().chars().next() {
                Some('[') | Some('{') => serde_json::from_str(&value)
                    .with_context(|| format!("'{key}' holds malformed JSON"))?,
                _ => Json::String(value),
            };
            map.insert(key, value);
        }
        UntypedObject::from(map).try_into()
    }

    pub fn vp_token(&self) -> &VpToken {
        &self.1
    }

    pub fn state(&self) -> &State {
        &self.2
    }

    pub fn as_query(&self) -> Result<String, Error> {
        Ok(serde_urlencoded::to_string(self.0.as_map())?)
    }
}

impl TryFrom<UntypedObject> for AuthorizationResponse {
    type Error = Error;

    fn try_from(value: UntypedObject) -> Result<Self, Self::Error> {
        let vp_token: VpToken = value.get().parsing_error()?;
        if vp_token.first().is_none() {
            bail!("'{}' is empty", VpToken::KEY)
        }
        let state: State = value.get().parsing_error()?;
        if state.0.is_empty() {
            bail!("'{}' is empty", State::KEY)
        }
        Ok(Self(value, vp_token, state))
    }
}

/// `vp_token` as sent by the wallet.
///
/// Older profiles send a single compact presentation (or an array of them); DCQL responses key
/// presentations by credential query id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VpToken {
    Single(String),
    Many(Vec<String>),
    ByQueryId(Map<String, Json>),
}

impl TypedParameter for VpToken {
    const KEY: &'static str = "vp_token";
}

impl VpToken {
    /// The first non-empty presentation in the token. Later presentations are ignored.
    pub fn first(&self) -> Option<&str> {
        let first = match self {
            VpToken::Single(s) => Some(s.as_str()),
            VpToken::Many(many) => many.first().map(String::as_str),
            VpToken::ByQueryId(map) => map.values().find_map(|v| match v {
                Json::String(s) => Some(s.as_str()),
                Json::Array(items) => items.first().and_then(Json::as_str),
                _ => None,
            }),
        };
        first.filter(|s| !s.is_empty())
    }
}
