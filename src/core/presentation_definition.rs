use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    credential_format::{ClaimFormatDesignation, ClaimFormatMap},
    input_descriptor::{Constraints, ConstraintsField, Filter, InputDescriptor},
    object::TypedParameter,
};
use crate::utils::NonEmptyVec;

/// Namespace of the EUDI PID mdoc, where `age_over_NN` attributes live.
pub const EUDI_PID_MDOC_NAMESPACE: &str = "eu.europa.ec.eudi.pid.1";

/// A presentation definition is a JSON object that describes the information a Verifier
/// requires of a Holder.
///
/// Only the subset used for age checks is modelled: input descriptors with field constraints
/// (path, filter type/const/minimum, intent to retain).
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition)
#[derive(Clone, Default, Debug, Serialize, Deserialize, PartialEq)]
pub struct PresentationDefinition {
    id: String,
    input_descriptors: Vec<InputDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<ClaimFormatMap>,
}

impl PresentationDefinition {
    pub fn new(id: String, input_descriptor: InputDescriptor) -> Self {
        Self {
            id,
            input_descriptors: vec![input_descriptor],
            ..Default::default()
        }
    }

    /// Request the boolean mdoc attribute `age_over_<min_age>` and require it to be `true`.
    ///
    /// The verifier does not keep the attribute (`intent_to_retain = false`).
    pub fn age_over(min_age: u32) -> Self {
        let field = ConstraintsField::new(NonEmptyVec::new(format!(
            "$['{EUDI_PID_MDOC_NAMESPACE}']['age_over_{min_age}']"
        )))
        .set_filter(Filter::boolean_const(true))
        .set_intent_to_retain(false);

        let mut format = ClaimFormatMap::new();
        format.insert(ClaimFormatDesignation::MsoMDoc, json!({ "alg": ["ES256"] }));

        let descriptor =
            InputDescriptor::new("age_credential".into(), Constraints::new().add_constraint(field))
                .set_format(format);

        Self::new(format!("age-verification-{min_age}"), descriptor)
            .set_purpose(age_purpose(min_age))
    }

    /// Request a numeric `age` claim of at least `min_age`.
    pub fn minimum_age(min_age: u32) -> Self {
        let mut paths = NonEmptyVec::new("$.credentialSubject.age".to_string());
        paths.push("$.vc.credentialSubject.age".to_string());

        let field = ConstraintsField::new(paths).set_filter(Filter::number_minimum(min_age));

        let descriptor =
            InputDescriptor::new("age_credential".into(), Constraints::new().add_constraint(field));

        Self::new(format!("age-verification-{min_age}"), descriptor)
            .set_purpose(age_purpose(min_age))
    }

    pub fn id(&self) -> &String {
        &self.id
    }

    pub fn input_descriptors(&self) -> &[InputDescriptor] {
        &self.input_descriptors
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

    pub fn set_format(mut self, format: ClaimFormatMap) -> Self {
        self.format = Some(format);
        self
    }

    pub fn format(&self) -> Option<&ClaimFormatMap> {
        self.format.as_ref()
    }
}

impl TypedParameter for PresentationDefinition {
    const KEY: &'static str = "presentation_definition";
}

fn age_purpose(min_age: u32) -> String {
    format!("Verify user is at least {min_age} years old")
}
