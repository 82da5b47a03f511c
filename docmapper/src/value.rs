// Value pipeline: cast -> setter on write, getter on read, lazy defaults

use crate::error::{Error, Result};
use crate::schema::FieldType;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Number, Value};
use std::fmt;
use std::sync::Arc;

pub type CastFn = Arc<dyn Fn(&Value) -> std::result::Result<Value, String> + Send + Sync>;
pub type TransformFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type DefaultFn = Arc<dyn Fn(&DefaultContext) -> Value + Send + Sync>;

/// Inputs a default producer may consult.
#[derive(Debug, Clone, Copy)]
pub struct DefaultContext {
    /// When the owning document was constructed.
    pub created_at: DateTime<Utc>,
}

#[derive(Clone)]
pub enum DefaultValue {
    Static(Value),
    Producer(DefaultFn),
}

impl DefaultValue {
    pub fn produce(&self, ctx: &DefaultContext) -> Value {
        match self {
            DefaultValue::Static(v) => v.clone(),
            DefaultValue::Producer(f) => f(ctx),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(v) => f.debug_tuple("Static").field(v).finish(),
            DefaultValue::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Runtime definition of one stored field.
#[derive(Clone)]
pub struct FieldDefinition {
    pub field_type: FieldType,
    pub required: bool,
    pub enum_values: Option<Vec<String>>,
    default: Option<DefaultValue>,
    cast: Option<CastFn>,
    getter: Option<TransformFn>,
    setter: Option<TransformFn>,
}

impl FieldDefinition {
    pub fn new(field_type: FieldType) -> Self {
        FieldDefinition {
            field_type,
            required: false,
            enum_values: None,
            default: None,
            cast: None,
            getter: None,
            setter: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn enum_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(DefaultValue::Static(value));
        self
    }

    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn(&DefaultContext) -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Producer(Arc::new(producer)));
        self
    }

    /// Replace the built-in cast for this field's type.
    pub fn cast_with<F>(mut self, cast: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        self.cast = Some(Arc::new(cast));
        self
    }

    pub fn get<F>(mut self, getter: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.getter = Some(Arc::new(getter));
        self
    }

    pub fn set<F>(mut self, setter: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    pub fn default_for(&self, ctx: &DefaultContext) -> Option<Value> {
        self.default.as_ref().map(|d| d.produce(ctx))
    }

    /// Coerce `value` to this field's type.
    pub fn cast(&self, field: &str, value: Value) -> Result<Value> {
        match &self.cast {
            Some(cast) => cast(&value).map_err(|reason| Error::Cast {
                field: field.to_string(),
                expected: reason,
                value: value.to_string(),
            }),
            None => cast_builtin(field, &self.field_type, value),
        }
    }

    /// Full write path: cast then setter. Runs once per explicit assignment.
    pub fn prepare(&self, field: &str, value: Value) -> Result<Value> {
        let cast = self.cast(field, value)?;
        Ok(match &self.setter {
            Some(setter) => setter(cast),
            None => cast,
        })
    }

    /// Read path. Not cached; runs on every read.
    pub fn apply_getter(&self, stored: Value) -> Value {
        match &self.getter {
            Some(getter) => getter(stored),
            None => stored,
        }
    }
}

impl fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("field_type", &self.field_type)
            .field("required", &self.required)
            .field("enum_values", &self.enum_values)
            .field("default", &self.default)
            .field("cast", &self.cast.is_some())
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}

/// Built-in coercion per semantic type. Null always passes through.
pub fn cast_builtin(field: &str, field_type: &FieldType, value: Value) -> Result<Value> {
    if value.is_null() {
        return Ok(value);
    }

    let fail = |value: &Value| Error::Cast {
        field: field.to_string(),
        expected: field_type.to_string(),
        value: value.to_string(),
    };

    match field_type {
        FieldType::Mixed => Ok(value),
        FieldType::String => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(fail(&other)),
        },
        FieldType::Number => match &value {
            Value::Number(_) => Ok(value),
            Value::String(s) => parse_number(s.trim()).ok_or_else(|| fail(&value)),
            Value::Bool(b) => Ok(Value::Number(Number::from(*b as i64))),
            _ => Err(fail(&value)),
        },
        FieldType::Boolean => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Ok(Value::Bool(true)),
                "false" | "0" | "no" => Ok(Value::Bool(false)),
                _ => Err(fail(&value)),
            },
            Value::Number(n) => match n.as_f64() {
                Some(x) if x == 1.0 => Ok(Value::Bool(true)),
                Some(x) if x == 0.0 => Ok(Value::Bool(false)),
                _ => Err(fail(&value)),
            },
            _ => Err(fail(&value)),
        },
        FieldType::Date => match &value {
            Value::String(s) => {
                let s = s.trim();
                if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    Ok(Value::String(date.format("%Y-%m-%d").to_string()))
                } else if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                    Ok(Value::String(
                        dt.with_timezone(&Utc).date_naive().format("%Y-%m-%d").to_string(),
                    ))
                } else {
                    Err(fail(&value))
                }
            }
            _ => Err(fail(&value)),
        },
        FieldType::Datetime => match &value {
            Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| Value::String(format_datetime(dt.with_timezone(&Utc))))
                .map_err(|_| fail(&value)),
            Value::Number(n) => n
                .as_i64()
                .and_then(DateTime::<Utc>::from_timestamp_millis)
                .map(|dt| Value::String(format_datetime(dt)))
                .ok_or_else(|| fail(&value)),
            _ => Err(fail(&value)),
        },
        FieldType::List => match value {
            Value::Array(_) => Ok(value),
            Value::Object(_) => Err(fail(&value)),
            scalar => Ok(Value::Array(vec![scalar])),
        },
        FieldType::Object => match value {
            Value::Object(_) => Ok(value),
            other => Err(fail(&other)),
        },
    }
}

/// Canonical stored form for datetimes.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_number(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::Number(Number::from(i)));
    }
    s.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}
