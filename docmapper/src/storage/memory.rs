use super::{retain_matching, Storage};
use crate::error::{Error, Result};
use crate::query::Filter;
use crate::record::RawRecord;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

type Collections = HashMap<String, BTreeMap<String, RawRecord>>;

/// Process-local storage. Records live as long as the value does.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    collections: RwLock<Collections>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }

    /// Synchronous lookup of one stored record.
    pub fn record(&self, collection: &str, id: &str) -> Option<RawRecord> {
        self.collections.read().ok()?.get(collection)?.get(id).cloned()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>> {
        self.collections
            .read()
            .map_err(|_| Error::Storage("memory storage lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>> {
        self.collections
            .write()
            .map_err(|_| Error::Storage("memory storage lock poisoned".into()))
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read_many(&self, collection: &str, filter: &Filter) -> Result<Vec<RawRecord>> {
        let records = match self.read()?.get(collection) {
            Some(records) => records.values().cloned().collect(),
            None => Vec::new(),
        };
        Ok(retain_matching(records, filter))
    }

    async fn write_one(&self, collection: &str, id: &str, record: RawRecord) -> Result<()> {
        self.write()?
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record);
        Ok(())
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<()> {
        if let Some(records) = self.write()?.get_mut(collection) {
            records.remove(id);
        }
        Ok(())
    }

    async fn collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .read()?
            .iter()
            .filter(|(_, records)| !records.is_empty())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, name: &str) -> RawRecord {
        RawRecord::try_from(json!({ "_id": id, "name": name })).unwrap()
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let storage = MemoryStorage::new();
        storage.write_one("users", "b", record("b", "Bob")).await.unwrap();
        storage.write_one("users", "a", record("a", "Ada")).await.unwrap();

        let all = storage.read_many("users", &Filter::new()).await.unwrap();
        let ids: Vec<_> = all.iter().filter_map(RawRecord::id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let bob = storage
            .read_many("users", &Filter::new().eq("name", json!("Bob")))
            .await
            .unwrap();
        assert_eq!(bob.len(), 1);

        storage.delete_one("users", "b").await.unwrap();
        storage.delete_one("users", "missing").await.unwrap();
        assert_eq!(storage.read_many("users", &Filter::new()).await.unwrap().len(), 1);
        assert_eq!(storage.collections().await.unwrap(), vec!["users"]);
    }

    #[tokio::test]
    async fn test_unknown_collection_is_empty() {
        let storage = MemoryStorage::new();
        assert!(storage.read_many("nope", &Filter::new()).await.unwrap().is_empty());
        assert!(storage.collections().await.unwrap().is_empty());
    }
}
