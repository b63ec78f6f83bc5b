use std::{env, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value as Json;
use url::Url;

use crate::verifier::{
    presentation::DEFAULT_TRUSTED_ISSUER,
    request_builder::{ClaimsQueryStyle, RequestFormat},
    store::DEFAULT_SWEEP_INTERVAL,
};

/// Path of the wallet callback, relative to the origin.
pub const DEFAULT_CALLBACK_PATH: &str = "api/eudi/callback";

/// Deployment configuration for a [Verifier](crate::verifier::Verifier).
#[derive(Deserialize, Debug, Clone)]
pub struct VerifierConfig {
    pub origin: BaseUrl,
    #[serde(default)]
    pub request_format: RequestFormat,
    /// Defaults to the style that goes with `request_format`.
    #[serde(default)]
    pub claims_query: Option<ClaimsQueryStyle>,
    /// PKCS#8 PEM ES256 private key. Required by the signed request formats.
    #[serde(default)]
    pub signing_key_pem: Option<String>,
    /// Public JWK published alongside the key. Must match it when both are set.
    #[serde(default)]
    pub public_jwk: Option<Json>,
    /// ES256 public JWK that wallet presentations are verified against.
    #[serde(default)]
    pub presentation_jwk: Option<Json>,
    #[serde(default = "default_trusted_issuers")]
    pub trusted_issuers: Vec<String>,
    /// Accept presentations without checking their signature. Testing only.
    #[serde(default)]
    pub skip_signature_verification: bool,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_callback_path")]
    pub callback_path: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    #[default]
    Memory,
    Redis {
        url: String,
    },
}

impl StoreConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreConfig::Memory => "memory",
            StoreConfig::Redis { .. } => "redis",
        }
    }
}

fn default_trusted_issuers() -> Vec<String> {
    vec![DEFAULT_TRUSTED_ISSUER.to_owned()]
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL.as_secs()
}

fn default_callback_path() -> String {
    DEFAULT_CALLBACK_PATH.to_owned()
}

impl VerifierConfig {
    pub fn new(origin: BaseUrl) -> Self {
        Self {
            origin,
            request_format: RequestFormat::default(),
            claims_query: None,
            signing_key_pem: None,
            public_jwk: None,
            presentation_jwk: None,
            trusted_issuers: default_trusted_issuers(),
            skip_signature_verification: false,
            store: StoreConfig::default(),
            store_timeout_ms: default_store_timeout_ms(),
            sweep_interval_secs: default_sweep_interval_secs(),
            callback_path: default_callback_path(),
        }
    }

    /// Read the configuration from `EUDI_*` environment variables.
    ///
    /// `REDIS_URL` selects the Redis session store when it is set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let origin = var("EUDI_ORIGIN").context("EUDI_ORIGIN is not set")?;
        let mut config = Self::new(origin.parse().context("EUDI_ORIGIN is not a URL")?);

        if let Some(format) = var("EUDI_REQUEST_FORMAT") {
            config.request_format = format.parse()?;
        }
        if let Some(style) = var("EUDI_CLAIMS_QUERY") {
            config.claims_query = Some(style.parse()?);
        }
        // Keys passed through env files often carry escaped newlines.
        config.signing_key_pem = var("EUDI_SIGNING_KEY_PEM").map(|pem| pem.replace("\\n", "\n"));
        config.public_jwk = var("EUDI_PUBLIC_JWK")
            .map(|jwk| serde_json::from_str(&jwk))
            .transpose()
            .context("EUDI_PUBLIC_JWK is not JSON")?;
        config.presentation_jwk = var("EUDI_PRESENTATION_JWK")
            .map(|jwk| serde_json::from_str(&jwk))
            .transpose()
            .context("EUDI_PRESENTATION_JWK is not JSON")?;
        if let Some(issuers) = var("EUDI_TRUSTED_ISSUERS") {
            config.trusted_issuers = issuers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect();
        }
        if let Some(skip) = var("EUDI_SKIP_SIGNATURE_VERIFICATION") {
            config.skip_signature_verification = skip
                .trim()
                .parse()
                .context("EUDI_SKIP_SIGNATURE_VERIFICATION must be true or false")?;
        }
        if let Some(url) = var("REDIS_URL") {
            config.store = StoreConfig::Redis { url };
        }
        if let Some(timeout) = var("EUDI_STORE_TIMEOUT_MS") {
            config.store_timeout_ms = timeout
                .trim()
                .parse()
                .context("EUDI_STORE_TIMEOUT_MS must be a number of milliseconds")?;
        }
        Ok(config)
    }

    pub fn claims_query(&self) -> ClaimsQueryStyle {
        self.claims_query
            .unwrap_or_else(|| self.request_format.default_claims_query())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// At least one second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// A url that is always a base (can be safely join()'ed with further path elements without
/// mangling).
#[derive(Deserialize, Debug, Clone, Hash, PartialEq, Eq)]
#[serde(try_from = "String")]
pub struct BaseUrl(Url);

impl BaseUrl {
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn join(&self, path: &str) -> Result<Url, url::ParseError> {
        self.0.join(path.trim_start_matches('/'))
    }

    /// The URL without its trailing slash, as a browser would print `location.origin`.
    pub fn origin_string(&self) -> String {
        self.0.as_str().trim_end_matches('/').to_owned()
    }
}

impl std::ops::Deref for BaseUrl {
    type Target = Url;

    fn deref(&self) -> &Url {
        &self.0
    }
}

impl TryFrom<String> for BaseUrl {
    type Error = url::ParseError;

    fn try_from(mut url: String) -> Result<Self, Self::Error> {
        // Make URL a base.
        if !url.ends_with('/') {
            url += "/"
        }
        url.parse().map(Self)
    }
}

impl FromStr for BaseUrl {
    type Err = url::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.to_owned().try_into()
    }
}
