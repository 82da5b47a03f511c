// Virtual fields: computed accessors over stored fields, never persisted

use crate::document::Document;
use crate::error::{Error, Result};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub type VirtualGetter = Arc<dyn Fn(&Document) -> Value + Send + Sync>;
pub type VirtualSetter =
    Arc<dyn Fn(&Value) -> std::result::Result<Vec<(String, Value)>, String> + Send + Sync>;

#[derive(Clone)]
pub struct VirtualDefinition {
    name: String,
    getter: VirtualGetter,
    setter: Option<VirtualSetter>,
}

impl VirtualDefinition {
    /// A read-only virtual. The getter must not depend on anything but the
    /// document's current field values.
    pub fn new<G>(name: impl Into<String>, getter: G) -> Self
    where
        G: Fn(&Document) -> Value + Send + Sync + 'static,
    {
        VirtualDefinition {
            name: name.into(),
            getter: Arc::new(getter),
            setter: None,
        }
    }

    /// Attach a setter that decomposes an assigned value into field mutations.
    /// Returning `Err(reason)` rejects the assignment without touching any field.
    pub fn with_setter<S>(mut self, setter: S) -> Self
    where
        S: Fn(&Value) -> std::result::Result<Vec<(String, Value)>, String>
            + Send
            + Sync
            + 'static,
    {
        self.setter = Some(Arc::new(setter));
        self
    }

    /// Two string fields joined by `separator`; assignment splits on the first
    /// occurrence and fails when the separator is missing.
    pub fn joined(name: &str, separator: &str, first: &str, second: &str) -> Self {
        let (f, s, sep) = (first.to_string(), second.to_string(), separator.to_string());
        let (f2, s2, sep2) = (f.clone(), s.clone(), sep.clone());

        VirtualDefinition::new(name, move |doc| {
            let part = |field: &str| match doc.get(field) {
                Some(Value::String(v)) => v,
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            Value::String(format!("{}{}{}", part(&f), sep, part(&s)))
        })
        .with_setter(move |value| {
            let text = value
                .as_str()
                .ok_or_else(|| format!("expected a string, got {value}"))?;
            let (head, tail) = text
                .split_once(sep2.as_str())
                .ok_or_else(|| format!("'{text}' has no '{sep2}' separator"))?;
            Ok(vec![
                (f2.clone(), Value::String(head.to_string())),
                (s2.clone(), Value::String(tail.to_string())),
            ])
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_setter(&self) -> bool {
        self.setter.is_some()
    }

    /// Recomputed on every call.
    pub fn get(&self, doc: &Document) -> Value {
        (self.getter)(doc)
    }

    /// Field mutations for an assignment, not yet applied.
    pub fn decompose(&self, value: &Value) -> Result<Vec<(String, Value)>> {
        let setter = self.setter.as_ref().ok_or_else(|| Error::VirtualAssignment {
            name: self.name.clone(),
            reason: "virtual is read-only".into(),
        })?;
        setter(value).map_err(|reason| Error::VirtualAssignment {
            name: self.name.clone(),
            reason,
        })
    }
}

impl fmt::Debug for VirtualDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualDefinition")
            .field("name", &self.name)
            .field("setter", &self.setter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_joined_decomposes_on_first_separator() {
        let v = VirtualDefinition::joined("fullName", " ", "first", "last");
        let muts = v.decompose(&json!("Mary Jane Watson")).unwrap();
        assert_eq!(
            muts,
            vec![
                ("first".to_string(), json!("Mary")),
                ("last".to_string(), json!("Jane Watson")),
            ]
        );
    }

    #[test]
    fn test_joined_rejects_missing_separator() {
        let v = VirtualDefinition::joined("fullName", " ", "first", "last");
        match v.decompose(&json!("Jane")).unwrap_err() {
            Error::VirtualAssignment { name, reason } => {
                assert_eq!(name, "fullName");
                assert!(reason.contains("separator"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(v.decompose(&json!(42)).is_err());
    }

    #[test]
    fn test_read_only_virtual_rejects_assignment() {
        let v = VirtualDefinition::new("initials", |_| json!("JS"));
        assert!(!v.has_setter());
        assert!(matches!(
            v.decompose(&json!("AB")),
            Err(Error::VirtualAssignment { .. })
        ));
    }
}
