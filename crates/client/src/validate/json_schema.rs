//! JSON Schema validator backed by the `jsonschema` crate.

use serde_json::Value;

use tether_core::{Error, ValidatorKind};

use super::{Schema, Validator, mismatched_schema};

/// Validates data against a compiled [`Schema::JsonSchema`]. The payload is
/// returned unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSchemaValidator;

impl Validator for JsonSchemaValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::JsonSchema
    }

    fn validate(&self, data: Value, schema: &Schema) -> Result<Value, Error> {
        let Schema::JsonSchema { compiled, .. } = schema else {
            return Err(mismatched_schema(self.kind(), schema));
        };

        let failures: Vec<String> = compiled
            .iter_errors(&data)
            .map(|error| {
                let path = error.instance_path.to_string();
                format!("{}: {}", if path.is_empty() { "/" } else { path.as_str() }, error)
            })
            .collect();

        if failures.is_empty() { Ok(data) } else { Err(Error::Validation(failures.join("; "))) }
    }
}
