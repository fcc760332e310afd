//! Pluggable response validation.
//!
//! A [`Validator`] checks decoded response data against a [`Schema`] and may
//! return a normalized replacement. Every adapter reports failures as
//! `Error::Validation` and nothing else.
//!
//! ### Kinds
//! - `serde`: the schema is a Rust type; data must deserialize into it.
//! - `jsonschema`: the schema is a JSON Schema document, compiled once.
//! - `guard`: the schema is a predicate closure.
//!
//! The set is closed. [`create_validator`] maps a kind to its adapter and
//! [`validator_for`] resolves a configured name, rejecting unknown names with
//! `Error::Configuration`.

mod guard;
mod json_schema;
mod typed;

pub use guard::GuardValidator;
pub use json_schema::JsonSchemaValidator;
pub use typed::SerdeValidator;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use tether_core::{Error, ValidatorKind};

type ParseFn = dyn Fn(Value) -> Result<Value, String> + Send + Sync;
type GuardFn = dyn Fn(&Value) -> Result<(), String> + Send + Sync;

/// A schema for one of the validator kinds.
#[derive(Clone)]
pub enum Schema {
    /// Round-trip through a Rust type.
    Typed { type_name: &'static str, parse: Arc<ParseFn> },
    /// Compiled JSON Schema document.
    JsonSchema { document: Arc<Value>, compiled: Arc<jsonschema::Validator> },
    /// Predicate returning a failure message.
    Guard(Arc<GuardFn>),
}

impl Schema {
    /// Schema requiring the data to deserialize into `T`.
    ///
    /// On success the payload is replaced by `T` serialized back to JSON, so
    /// serde defaults and renames are applied.
    pub fn typed<T>() -> Self
    where
        T: DeserializeOwned + Serialize + 'static,
    {
        let parse = |data: Value| -> Result<Value, String> {
            let typed: T = serde_json::from_value(data).map_err(|e| e.to_string())?;
            serde_json::to_value(typed).map_err(|e| e.to_string())
        };
        Schema::Typed { type_name: std::any::type_name::<T>(), parse: Arc::new(parse) }
    }

    /// Schema from a JSON Schema document, e.g.
    /// `{"type": "object", "required": ["id"], "properties": {"id": {"type": "integer"}}}`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the document is not a valid schema.
    pub fn json_schema(document: Value) -> Result<Self, Error> {
        let compiled = jsonschema::validator_for(&document)
            .map_err(|e| Error::Configuration(format!("invalid JSON schema: {}", e)))?;
        Ok(Schema::JsonSchema { document: Arc::new(document), compiled: Arc::new(compiled) })
    }

    /// Schema backed by a predicate.
    pub fn guard<F>(check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        Schema::Guard(Arc::new(check))
    }

    /// The validator kind able to check this schema.
    pub fn kind(&self) -> ValidatorKind {
        match self {
            Schema::Typed { .. } => ValidatorKind::Serde,
            Schema::JsonSchema { .. } => ValidatorKind::JsonSchema,
            Schema::Guard(_) => ValidatorKind::Guard,
        }
    }
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schema::Typed { type_name, .. } => f.debug_tuple("Typed").field(type_name).finish(),
            Schema::JsonSchema { document, .. } => f.debug_tuple("JsonSchema").field(document).finish(),
            Schema::Guard(_) => f.write_str("Guard(..)"),
        }
    }
}

/// Validation capability shared by all adapters.
pub trait Validator: Send + Sync {
    fn kind(&self) -> ValidatorKind;

    /// Check `data` against `schema`, returning the (possibly normalized) value.
    ///
    /// # Errors
    ///
    /// Only ever `Error::Validation`.
    fn validate(&self, data: Value, schema: &Schema) -> Result<Value, Error>;
}

/// Adapter for `kind`.
pub fn create_validator(kind: ValidatorKind) -> Box<dyn Validator> {
    match kind {
        ValidatorKind::Serde => Box::new(SerdeValidator),
        ValidatorKind::JsonSchema => Box::new(JsonSchemaValidator),
        ValidatorKind::Guard => Box::new(GuardValidator),
    }
}

/// Adapter for a configured validator name.
///
/// # Errors
///
/// Returns `Error::Configuration` for names outside the supported set.
pub fn validator_for(name: &str) -> Result<Box<dyn Validator>, Error> {
    Ok(create_validator(name.parse()?))
}

fn mismatched_schema(adapter: ValidatorKind, schema: &Schema) -> Error {
    Error::Validation(format!("{} schema cannot be checked by the {} validator", schema.kind(), adapter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_core::ErrorKind;

    #[test]
    fn test_create_validator_per_kind() {
        for kind in ValidatorKind::ALL {
            assert_eq!(create_validator(kind).kind(), kind);
        }
    }

    #[test]
    fn test_validator_for_unknown_name_is_configuration_error() {
        let err = validator_for("protobuf").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_validator_for_known_name() {
        assert_eq!(validator_for("jsonschema").unwrap().kind(), ValidatorKind::JsonSchema);
    }

    #[test]
    fn test_schema_kind() {
        assert_eq!(Schema::typed::<Value>().kind(), ValidatorKind::Serde);
        assert_eq!(Schema::json_schema(json!({"type": "string"})).unwrap().kind(), ValidatorKind::JsonSchema);
        assert_eq!(Schema::guard(|_| Ok(())).kind(), ValidatorKind::Guard);
    }

    #[test]
    fn test_mismatched_schema_is_validation_error() {
        let validator = create_validator(ValidatorKind::Serde);
        let schema = Schema::json_schema(json!({"type": "number"})).unwrap();
        let err = validator.validate(json!(1), &schema).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("jsonschema schema"));
    }
}
