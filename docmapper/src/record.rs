use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which every record stores its identity.
pub const ID_FIELD: &str = "_id";

/// Exactly what a storage backend persists: field name to stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    pub fn new() -> Self {
        RawRecord(Map::new())
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Resolve a dotted path (`address.city`) through nested objects.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        RawRecord(map)
    }
}

impl TryFrom<Value> for RawRecord {
    type Error = crate::Error;

    fn try_from(value: Value) -> crate::Result<Self> {
        match value {
            Value::Object(map) => Ok(RawRecord(map)),
            other => Err(crate::Error::Storage(format!(
                "record must be an object, got {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested_path() {
        let record = RawRecord::try_from(json!({
            "_id": "a1",
            "address": { "city": "NYC", "geo": { "lat": 40.7 } }
        }))
        .unwrap();

        assert_eq!(record.id(), Some("a1"));
        assert_eq!(record.lookup("address.city"), Some(&json!("NYC")));
        assert_eq!(record.lookup("address.geo.lat"), Some(&json!(40.7)));
        assert_eq!(record.lookup("address.zip"), None);
        assert_eq!(record.lookup("missing.path"), None);
    }

    #[test]
    fn test_non_object_rejected() {
        let result = RawRecord::try_from(json!([1, 2, 3]));
        assert!(result.unwrap_err().is_storage());
    }
}
