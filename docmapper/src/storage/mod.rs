// Storage backends: the persistence boundary below the operation pipelines

mod file;
mod memory;
mod sqlite;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use crate::error::Result;
use crate::query::Filter;
use crate::record::RawRecord;
use async_trait::async_trait;

/// A keyed record store, one namespace per collection.
///
/// Implementations only move raw records. Casting, defaults, hooks and
/// validation all happen above this trait.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Every record in `collection` matching `filter`, ordered by id.
    async fn read_many(&self, collection: &str, filter: &Filter) -> Result<Vec<RawRecord>>;

    /// Insert or replace the record stored under `id`.
    async fn write_one(&self, collection: &str, id: &str, record: RawRecord) -> Result<()>;

    /// Delete the record stored under `id`. Deleting a missing id is not an error.
    async fn delete_one(&self, collection: &str, id: &str) -> Result<()>;

    /// Collection names that currently hold at least one record.
    async fn collections(&self) -> Result<Vec<String>>;
}

/// Keep the records that match `filter`.
pub(crate) fn retain_matching(records: Vec<RawRecord>, filter: &Filter) -> Vec<RawRecord> {
    records.into_iter().filter(|r| filter.matches(r)).collect()
}
