use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Top-level declarative schema parsed from schema.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub models: HashMap<String, ModelDefinition>,
}

/// Declarative definition of a single model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDefinition {
    #[serde(default)]
    pub fields: HashMap<String, FieldSpec>,
    #[serde(default)]
    pub additional_properties: bool,
    #[serde(default)]
    pub timestamps: bool,
    #[serde(default)]
    pub id: Option<IdConfig>,
}

/// Configuration for document ID generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdConfig {
    pub auto: Option<AutoIdStrategy>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoIdStrategy {
    #[default]
    Ulid,
    Uuid,
    Nanoid,
}

impl AutoIdStrategy {
    pub fn generate(&self) -> String {
        match self {
            AutoIdStrategy::Ulid => ulid::Ulid::new().to_string().to_lowercase(),
            AutoIdStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
            AutoIdStrategy::Nanoid => nanoid::nanoid!(),
        }
    }
}

/// Declarative definition of a single field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(rename = "enum", default)]
    pub enum_values: Option<Vec<String>>,
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
}

/// Semantic type of a stored field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Datetime,
    List,
    Object,
    Mixed,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Datetime => "datetime",
            FieldType::List => "list",
            FieldType::Object => "object",
            FieldType::Mixed => "mixed",
        };
        f.write_str(name)
    }
}
