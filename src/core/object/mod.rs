use std::fmt::Debug;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value as Json};

/// An untyped (JSON) Object from which [TypedParameters](TypedParameter) can be parsed.
///
/// Represents authorization request payloads, client metadata and wallet responses.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UntypedObject(pub(crate) Map<String, Json>);

/// A strongly typed parameter that lives under a fixed key of an [UntypedObject].
pub trait TypedParameter: Serialize + DeserializeOwned + Clone + Debug {
    const KEY: &'static str;
}

impl UntypedObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a [TypedParameter] from the Object.
    ///
    /// Note that this method clones the underlying data.
    pub fn get<T: TypedParameter>(&self) -> Option<Result<T>> {
        let value = self.0.get(T::KEY)?.clone();
        Some(serde_json::from_value(value).map_err(Into::into))
    }

    /// Get a [TypedParameter] from the Object or return the default value.
    pub fn get_or_default<T: TypedParameter + Default>(&self) -> Result<T> {
        self.get().transpose().map(Option::unwrap_or_default)
    }

    /// Insert a [TypedParameter], replacing any previous value under the same key.
    pub fn insert<T: TypedParameter>(&mut self, t: T) -> Result<()> {
        let value = serde_json::to_value(t)
            .with_context(|| format!("failed to serialize '{}'", T::KEY))?;
        self.0.insert(T::KEY.to_owned(), value);
        Ok(())
    }

    /// Builder-style [insert](Self::insert).
    pub fn with<T: TypedParameter>(mut self, t: T) -> Result<Self> {
        self.insert(t)?;
        Ok(self)
    }

    /// Remove a [TypedParameter] from the Object.
    pub fn remove<T: TypedParameter>(&mut self) -> Option<Result<T>> {
        let value = self.0.remove(T::KEY)?;
        Some(serde_json::from_value(value).map_err(Into::into))
    }

    pub fn contains<T: TypedParameter>(&self) -> bool {
        self.0.contains_key(T::KEY)
    }

    pub fn as_map(&self) -> &Map<String, Json> {
        &self.0
    }
}

impl From<Map<String, Json>> for UntypedObject {
    fn from(value: Map<String, Json>) -> Self {
        Self(value)
    }
}

impl From<UntypedObject> for Json {
    fn from(value: UntypedObject) -> Self {
        value.0.into()
    }
}

pub trait ParsingErrorContext {
    type T: TypedParameter;

    fn parsing_error(self) -> Result<Self::T>;
}

impl<T: TypedParameter> ParsingErrorContext for Option<Result<T>> {
    type T = T;

    fn parsing_error(self) -> Result<T> {
        self.context(format!("'{}' is missing", T::KEY))?
            .context(format!("'{}' could not be parsed", T::KEY))
    }
}

impl<T: TypedParameter> ParsingErrorContext for Result<T> {
    type T = T;

    fn parsing_error(self) -> Result<T> {
        self.context(format!("'{}' could not be parsed", T::KEY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(transparent)]
    struct Greeting(String);

    impl TypedParameter for Greeting {
        const KEY: &'static str = "greeting";
    }

    #[test]
    fn insert_get_remove() {
        let mut object = UntypedObject::new();
        assert!(object.get::<Greeting>().is_none());
        assert_eq!(object.get_or_default::<Greeting>().unwrap(), Greeting::default());

        object.insert(Greeting("hello".into())).unwrap();
        assert!(object.contains::<Greeting>());
        assert_eq!(object.get::<Greeting>().parsing_error().unwrap().0, "hello");

        assert_eq!(object.remove::<Greeting>().unwrap().unwrap().0, "hello");
        assert!(!object.contains::<Greeting>());
    }

    #[test]
    fn mistyped_value_reports_key() {
        let object: UntypedObject =
            serde_json::from_value(serde_json::json!({ "greeting": 42 })).unwrap();
        let err = object.get::<Greeting>().parsing_error().unwrap_err();
        assert!(err.to_string().contains("greeting"));
    }
}
