use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::credential_format::ClaimFormatMap;
use crate::utils::NonEmptyVec;

/// A JSONPath is a string that represents a path to a specific value within a JSON object.
///
/// For syntax details, see [https://identity.foundation/presentation-exchange/spec/v2.0.0/#jsonpath-syntax-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#jsonpath-syntax-definition)
pub type JsonPath = String;

/// Input Descriptors are objects used to describe the information a Verifier requires of a
/// Holder.
///
/// See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct InputDescriptor {
    id: String,
    #[serde(default)]
    constraints: Constraints,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(default, skip_serializing_if = "ClaimFormatMap::is_empty")]
    format: ClaimFormatMap,
}

impl InputDescriptor {
    pub fn new(id: String, constraints: Constraints) -> Self {
        Self {
            id,
            constraints,
            ..Default::default()
        }
    }

    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    pub fn set_name(mut self, name: String) -> Self {
        self.name = Some(name);
        self
    }

    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    pub fn set_purpose(mut self, purpose: String) -> Self {
        self.purpose = Some(purpose);
        self
    }

    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    /// Constrain submission of this input to the given formats and algorithms.
    pub fn set_format(mut self, format: ClaimFormatMap) -> Self {
        self.format = format;
        self
    }

    pub fn format(&self) -> &ClaimFormatMap {
        &self.format
    }
}

/// Constraints a Holder must satisfy to fulfill an Input Descriptor.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<ConstraintsField>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_constraint(mut self, field: ConstraintsField) -> Self {
        self.fields.push(field);
        self
    }

    pub fn fields(&self) -> &[ConstraintsField] {
        &self.fields
    }
}

/// A single requested claim. The first `path` that resolves in the credential is evaluated
/// against `filter`.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ConstraintsField {
    path: NonEmptyVec<JsonPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    intent_to_retain: Option<bool>,
}

impl ConstraintsField {
    pub fn new(path: NonEmptyVec<JsonPath>) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }

    pub fn set_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn set_intent_to_retain(mut self, intent_to_retain: bool) -> Self {
        self.intent_to_retain = Some(intent_to_retain);
        self
    }

    pub fn path(&self) -> &[JsonPath] {
        &self.path
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn intent_to_retain(&self) -> Option<bool> {
        self.intent_to_retain
    }
}

/// The JSON Schema subset used in field filters: a type plus either an exact value or a
/// numeric lower bound.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Filter {
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "const", skip_serializing_if = "Option::is_none")]
    constant: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    minimum: Option<u32>,
}

impl Filter {
    /// `{"type": "boolean", "const": <value>}`
    pub fn boolean_const(value: bool) -> Self {
        Self {
            kind: "boolean".into(),
            constant: Some(Json::Bool(value)),
            minimum: None,
        }
    }

    /// `{"type": "number", "minimum": <minimum>}`
    pub fn number_minimum(minimum: u32) -> Self {
        Self {
            kind: "number".into(),
            constant: None,
            minimum: Some(minimum),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn constant(&self) -> Option<&Json> {
        self.constant.as_ref()
    }

    pub fn minimum(&self) -> Option<u32> {
        self.minimum
    }
}
