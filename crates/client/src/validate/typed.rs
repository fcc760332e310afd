//! Serde-backed validator.

use serde_json::Value;

use tether_core::{Error, ValidatorKind};

use super::{Schema, Validator, mismatched_schema};

/// Validates by deserializing into the schema's Rust type.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerdeValidator;

impl Validator for SerdeValidator {
    fn kind(&self) -> ValidatorKind {
        ValidatorKind::Serde
    }

    fn validate(&self, data: Value, schema: &Schema) -> Result<Value, Error> {
        let Schema::Typed { type_name, parse } = schema else {
            return Err(mismatched_schema(self.kind(), schema));
        };

        parse(data).map_err(|e| Error::Validation(format!("response does not match {}: {}", type_name, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize)]
    struct User {
        id: u64,
        name: String,
        #[serde(default)]
        admin: bool,
    }

    #[test]
    fn test_valid_payload_is_normalized() {
        let data = json!({"id": 1, "name": "ada", "extra": "dropped"});
        let value = SerdeValidator.validate(data, &Schema::typed::<User>()).unwrap();
        assert_eq!(value, json!({"id": 1, "name": "ada", "admin": false}));
    }

    #[test]
    fn test_invalid_payload() {
        let data = json!({"id": "one", "name": "ada"});
        let err = SerdeValidator.validate(data, &Schema::typed::<User>()).unwrap_err();
        assert!(matches!(&err, Error::Validation(msg) if msg.contains("User")));
    }

    #[test]
    fn test_missing_field() {
        let err = SerdeValidator.validate(json!({"id": 1}), &Schema::typed::<User>()).unwrap_err();
        assert!(matches!(&err, Error::Validation(msg) if msg.contains("name")));
    }
}
