use super::registry::{Schema, SchemaOptions};
use super::types::{ModelDefinition, SchemaDefinition};
use crate::error::Result;
use crate::value::FieldDefinition;
use std::path::Path;

/// Parse a schema.yaml file into a SchemaDefinition
pub fn parse_schema(path: &Path) -> Result<SchemaDefinition> {
    let content = std::fs::read_to_string(path)?;
    parse_schema_str(&content)
}

/// Parse a schema YAML string into a SchemaDefinition
pub fn parse_schema_str(content: &str) -> Result<SchemaDefinition> {
    let schema: SchemaDefinition = serde_yaml::from_str(content)?;
    Ok(schema)
}

impl ModelDefinition {
    /// Build an unfrozen runtime schema. Code may still add casts, getters,
    /// setters, virtuals and hooks before the model is registered.
    pub fn to_schema(&self) -> Result<Schema> {
        let mut schema = Schema::with_options(SchemaOptions {
            id_strategy: self.id.as_ref().and_then(|c| c.auto).unwrap_or_default(),
            timestamps: self.timestamps,
            additional_properties: self.additional_properties,
        });

        // Sorted so definition errors are reported deterministically
        let mut names: Vec<&String> = self.fields.keys().collect();
        names.sort();

        for name in names {
            let spec = &self.fields[name];
            let mut def = FieldDefinition::new(spec.field_type.clone());
            if spec.required {
                def = def.required();
            }
            if let Some(values) = &spec.enum_values {
                def = def.enum_values(values.clone());
            }
            if let Some(default) = &spec.default {
                def = def.default_value(serde_json::to_value(default)?);
            }
            schema.define(name, def)?;
        }

        Ok(schema)
    }
}
