use crate::error::Result;
use crate::storage::{FileStorage, MemoryStorage, SqliteStorage, Storage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Store configuration, usually read from `docmapper.yaml`.
///
/// ```yaml
/// schema: schema.yaml
/// storage:
///   backend: sqlite
///   path: data.db
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    /// Model definitions to load, relative to the config file.
    #[serde(default)]
    pub schema: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    #[default]
    Memory,
    File {
        dir: PathBuf,
    },
    Sqlite {
        path: PathBuf,
    },
}

impl StoreConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut config: StoreConfig = serde_yaml::from_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Make relative paths relative to `base` instead of the working directory.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        match &mut self.storage {
            StorageConfig::Memory => {}
            StorageConfig::File { dir } => rebase(dir),
            StorageConfig::Sqlite { path } => rebase(path),
        }
        if let Some(schema) = &mut self.schema {
            rebase(schema);
        }
    }
}

impl StorageConfig {
    pub fn open(&self) -> Result<Arc<dyn Storage>> {
        let storage: Arc<dyn Storage> = match self {
            StorageConfig::Memory => Arc::new(MemoryStorage::new()),
            StorageConfig::File { dir } => Arc::new(FileStorage::new(dir.clone())),
            StorageConfig::Sqlite { path } => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                Arc::new(SqliteStorage::open(path)?)
            }
        };
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_backends() {
        let config = StoreConfig::from_yaml("storage:\n  backend: file\n  dir: data\n").unwrap();
        assert_eq!(
            config.storage,
            StorageConfig::File {
                dir: PathBuf::from("data")
            }
        );
        assert_eq!(config.schema, None);

        let config = StoreConfig::from_yaml("schema: models.yaml\n").unwrap();
        assert_eq!(config.storage, StorageConfig::Memory);
        assert_eq!(config.schema, Some(PathBuf::from("models.yaml")));

        assert!(StoreConfig::from_yaml("storage:\n  backend: redis\n").is_err());
    }

    #[test]
    fn test_load_resolves_relative_paths() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("docmapper.yaml");
        std::fs::write(
            &path,
            "schema: schema.yaml\nstorage:\n  backend: sqlite\n  path: db/data.db\n",
        )
        .unwrap();

        let config = StoreConfig::load(&path).unwrap();
        assert_eq!(config.schema, Some(tmp.path().join("schema.yaml")));
        assert_eq!(
            config.storage,
            StorageConfig::Sqlite {
                path: tmp.path().join("db/data.db")
            }
        );
        config.storage.open().unwrap();
        assert!(tmp.path().join("db/data.db").exists());
    }
}
