//! Predicate validator.

use serde_json::Value;

use tether_core::{Error, ValidatorKind};

use super::{Schema, Validator, mismatched_schema};

/// Validates with a user-supplied predicate. The payload is returned unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct GuardValidator;

impl Validator for GuardValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Guard
    }

    fn validate(&self, data: Value, schema: &Schema) -> Result<Value, Error> {
        let Schema::Guard(check) = schema else {
            return Err(mismatched_schema(self.kind(), schema));
        };

        match check(&data) {
            Ok(()) => Ok(data),
            Err(reason) => Err(Error::Validation(reason)),
        }
    }
}
