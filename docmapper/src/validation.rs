use crate::document::Document;
use crate::schema::{FieldType, Schema};
use crate::value::FieldDefinition;
use serde_json::Value;

/// Result of validating a document
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Check a document's stored values against its schema, after defaults are
/// populated. Missing required fields and out-of-enum values are errors. A
/// stored value whose shape disagrees with the declared type is a warning.
pub fn validate_document(schema: &Schema, doc: &Document) -> ValidationResult {
    let mut result = ValidationResult::default();

    for (name, def) in schema.fields() {
        let value = doc.get_raw(name).filter(|v| !v.is_null());

        let Some(value) = value else {
            if def.required {
                result
                    .errors
                    .push(format!("Required field '{name}' is missing"));
            }
            continue;
        };

        check_enum(name, def, value, &mut result);

        if !type_matches(&def.field_type, value) {
            result.warnings.push(format!(
                "Field '{name}' holds {} but is declared {}",
                kind_of(value),
                def.field_type
            ));
        }
    }

    result
}

fn check_enum(name: &str, def: &FieldDefinition, value: &Value, result: &mut ValidationResult) {
    let Some(allowed) = &def.enum_values else {
        return;
    };
    let values: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };
    for v in values {
        let ok = v.as_str().is_some_and(|s| allowed.iter().any(|a| a == s));
        if !ok {
            result.errors.push(format!(
                "Field '{name}' value {v} is not one of: {}",
                allowed.join(", ")
            ));
        }
    }
}

fn type_matches(field_type: &FieldType, value: &Value) -> bool {
    match field_type {
        FieldType::String | FieldType::Date | FieldType::Datetime => value.is_string(),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::List => value.is_array(),
        FieldType::Object => value.is_object(),
        FieldType::Mixed => true,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::Model;
    use crate::record::RawRecord;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::sync::Arc;

    fn test_model() -> Model {
        let mut schema = Schema::new();
        schema
            .define("name", FieldDefinition::new(FieldType::String).required())
            .unwrap()
            .define(
                "role",
                FieldDefinition::new(FieldType::String).enum_values(["admin", "member"]),
            )
            .unwrap()
            .define(
                "tags",
                FieldDefinition::new(FieldType::List).enum_values(["a", "b"]),
            )
            .unwrap()
            .define("age", FieldDefinition::new(FieldType::Number))
            .unwrap();
        Model::new(
            "users",
            schema,
            Arc::new(MemoryStorage::new()),
            Arc::new(ManualClock::default()),
        )
    }

    fn hydrated(model: &Model, value: Value) -> Document {
        model.hydrate(RawRecord::try_from(value).unwrap()).unwrap()
    }

    #[test]
    fn test_valid_user() {
        let model = test_model();
        let doc = hydrated(&model, json!({ "_id": "1", "name": "Ada", "role": "admin", "tags": ["a"] }));
        let result = validate_document(model.schema(), &doc);
        assert!(result.is_ok(), "{:?}", result.errors);
        assert!(!result.has_warnings());
    }

    #[test]
    fn test_missing_required_field() {
        let model = test_model();
        let doc = hydrated(&model, json!({ "_id": "1", "name": null }));
        let result = validate_document(model.schema(), &doc);
        assert_eq!(result.errors, vec!["Required field 'name' is missing".to_string()]);
    }

    #[test]
    fn test_invalid_enum_value() {
        let model = test_model();
        let doc = hydrated(
            &model,
            json!({ "_id": "1", "name": "Ada", "role": "owner", "tags": ["a", "z"] }),
        );
        let result = validate_document(model.schema(), &doc);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors[0].contains("'role'"));
        assert!(result.errors[1].contains("'tags'"));
    }

    #[test]
    fn test_type_mismatch_is_warning() {
        let model = test_model();
        let doc = hydrated(&model, json!({ "_id": "1", "name": "Ada", "age": "old" }));
        let result = validate_document(model.schema(), &doc);
        assert!(result.is_ok());
        assert_eq!(
            result.warnings,
            vec!["Field 'age' holds a string but is declared number".to_string()]
        );
    }
}
