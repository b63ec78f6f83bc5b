use anyhow::{bail, Context, Error, Result};
use base64::prelude::*;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::ops::Deref;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(try_from = "Vec<T>", into = "Vec<T>")]
pub struct NonEmptyVec<T: Clone>(Vec<T>);

impl<T: Clone> NonEmptyVec<T> {
    pub fn new(t: T) -> Self {
        Self(vec![t])
    }

    pub fn push(&mut self, t: T) {
        self.0.push(t)
    }

    /// The first element, which always exists.
    pub fn head(&self) -> &T {
        &self.0[0]
    }
}

impl<T: Clone> TryFrom<Vec<T>> for NonEmptyVec<T> {
    type Error = Error;

    fn try_from(v: Vec<T>) -> Result<NonEmptyVec<T>, Error> {
        if v.is_empty() {
            bail!("cannot create a NonEmptyVec from an empty Vec")
        }
        Ok(NonEmptyVec(v))
    }
}

impl<T: Clone> From<NonEmptyVec<T>> for Vec<T> {
    fn from(NonEmptyVec(v): NonEmptyVec<T>) -> Vec<T> {
        v
    }
}

impl<T: Clone> Deref for NonEmptyVec<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

/// A JWS in compact serialization, split into its three base64url segments.
///
/// Nothing is verified on parse; callers decide whether the signature matters.
#[derive(Debug, Clone, Copy)]
pub struct CompactJwt<'a> {
    header: &'a str,
    payload: &'a str,
    signature: &'a str,
}

impl<'a> CompactJwt<'a> {
    pub fn parse(jwt: &'a str) -> Result<Self> {
        let mut segments = jwt.split('.');
        let (Some(header), Some(payload), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            bail!("expected three '.' separated segments")
        };
        if header.is_empty() || payload.is_empty() {
            bail!("header and payload segments must not be empty")
        }
        Ok(Self {
            header,
            payload,
            signature,
        })
    }

    pub fn header<T: DeserializeOwned>(&self) -> Result<T> {
        decode_segment(self.header).context("unable to decode JWT header")
    }

    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        decode_segment(self.payload).context("unable to decode JWT payload")
    }

    /// `<header>.<payload>`, the bytes covered by the signature.
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.payload)
    }

    pub fn signature(&self) -> Result<Vec<u8>> {
        BASE64_URL_SAFE_NO_PAD
            .decode(self.signature)
            .context("JWT signature is not base64url")
    }

    pub fn is_unsigned(&self) -> bool {
        self.signature.is_empty()
    }
}

/// Base64url (no padding) encoding of a JSON-serialized value.
pub fn encode_segment<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_vec(value)
        .map(|bytes| BASE64_URL_SAFE_NO_PAD.encode(bytes))
        .context("unable to serialize JWT segment")
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T> {
    let bytes = BASE64_URL_SAFE_NO_PAD.decode(segment)?;
    Ok(serde_json::from_slice(&bytes)?)
}
