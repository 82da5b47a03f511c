use super::{retain_matching, Storage};
use crate::error::{Error, Result};
use crate::query::Filter;
use crate::record::RawRecord;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};

/// One YAML file per record: `<root>/<collection>/<id>.yaml`.
///
/// Writes go to a temp file in the same directory and are renamed into
/// place, so a reader never sees a half-written record.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// The root directory is created on first write if missing.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStorage { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> Result<PathBuf> {
        check_segment("collection", collection)?;
        Ok(self.root.join(collection))
    }

    fn record_path(&self, collection: &str, id: &str) -> Result<PathBuf> {
        check_segment("id", id)?;
        Ok(self.collection_dir(collection)?.join(format!("{id}.yaml")))
    }

    fn scan(&self, collection: &str) -> Result<Vec<RawRecord>> {
        let dir = self.collection_dir(collection)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let pattern = format!("{}/*.yaml", glob::Pattern::escape(&dir.to_string_lossy()));
        let mut files: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(|r| r.ok()).collect();
        files.sort();

        let mut records = Vec::with_capacity(files.len());
        for file in files {
            match read_record(&file) {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("Skipping unreadable record {}: {e}", file.display()),
            }
        }
        Ok(records)
    }
}

/// Ids and collection names become path segments.
fn check_segment(what: &str, segment: &str) -> Result<()> {
    if segment.is_empty()
        || segment.starts_with('.')
        || segment.contains(['/', '\\'])
    {
        return Err(Error::Storage(format!("invalid {what} for file storage: '{segment}'")));
    }
    Ok(())
}

fn read_record(path: &Path) -> Result<RawRecord> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

#[async_trait]
impl Storage for FileStorage {
    async fn read_many(&self, collection: &str, filter: &Filter) -> Result<Vec<RawRecord>> {
        Ok(retain_matching(self.scan(collection)?, filter))
    }

    async fn write_one(&self, collection: &str, id: &str, record: RawRecord) -> Result<()> {
        let path = self.record_path(collection, id)?;
        let dir = self.collection_dir(collection)?;
        std::fs::create_dir_all(&dir)?;

        let yaml = serde_yaml::to_string(&record)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(yaml.as_bytes())?;
        tmp.persist(&path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<()> {
        let path = self.record_path(collection, id)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn collections(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if !self.scan(&name)?.is_empty() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}
