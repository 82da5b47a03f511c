//! Test doubles: a storage that counts calls and can be told to fail, and
//! a re-export of the manual clock.

use crate::error::{Error, Result};
use crate::query::Filter;
use crate::record::RawRecord;
use crate::storage::{MemoryStorage, Storage};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub use crate::clock::ManualClock;

type WriteObserver = Box<dyn Fn() + Send + Sync>;

/// In-memory storage that records how often each primitive was called.
#[derive(Default)]
pub struct RecordingStorage {
    inner: MemoryStorage,
    reads: AtomicUsize,
    writes: AtomicUsize,
    deletes: AtomicUsize,
    fail_writes: AtomicBool,
    on_write: Mutex<Option<WriteObserver>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        RecordingStorage::default()
    }

    /// Number of `read_many` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of successful `write_one` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Make every following write fail with a storage error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Run `observer` after each successful write.
    pub fn on_write(&self, observer: impl Fn() + Send + Sync + 'static) {
        if let Ok(mut slot) = self.on_write.lock() {
            *slot = Some(Box::new(observer));
        }
    }

    pub fn record(&self, collection: &str, id: &str) -> Option<RawRecord> {
        self.inner.record(collection, id)
    }

    /// Store records directly, bypassing the counters.
    pub async fn seed(&self, collection: &str, records: Vec<RawRecord>) -> Result<()> {
        for record in records {
            let id = record
                .id()
                .ok_or_else(|| Error::Storage("seed record has no id".into()))?
                .to_string();
            self.inner.write_one(collection, &id, record).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn read_many(&self, collection: &str, filter: &Filter) -> Result<Vec<RawRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_many(collection, filter).await
    }

    async fn write_one(&self, collection: &str, id: &str, record: RawRecord) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("write to {collection}/{id} refused")));
        }
        self.inner.write_one(collection, id, record).await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Ok(slot) = self.on_write.lock() {
            if let Some(observer) = slot.as_ref() {
                observer();
            }
        }
        Ok(())
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_one(collection, id).await
    }

    async fn collections(&self) -> Result<Vec<String>> {
        self.inner.collections().await
    }
}
