use super::{retain_matching, Storage};
use crate::error::{Error, Result};
use crate::query::Filter;
use crate::record::RawRecord;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Records as JSON rows in a single `documents` table keyed by (collection, id).
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT NOT NULL,
                collection TEXT NOT NULL,
                data_json TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);
            ",
        )?;
        Ok(SqliteStorage {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("sqlite connection lock poisoned".into()))
    }

    fn list(&self, collection: &str) -> Result<Vec<RawRecord>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT data_json FROM documents WHERE collection = ?1 ORDER BY id")?;
        let rows = stmt.query_map(params![collection], |row| row.get::<_, String>(0))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(serde_json::from_str(&row?)?);
        }
        Ok(records)
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn read_many(&self, collection: &str, filter: &Filter) -> Result<Vec<RawRecord>> {
        Ok(retain_matching(self.list(collection)?, filter))
    }

    async fn write_one(&self, collection: &str, id: &str, record: RawRecord) -> Result<()> {
        let data_json = serde_json::to_string(&record)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO documents (id, collection, data_json) VALUES (?1, ?2, ?3)",
            params![id, collection, data_json],
        )?;
        Ok(())
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;
        Ok(())
    }

    async fn collections(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT DISTINCT collection FROM documents ORDER BY collection")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }
}
