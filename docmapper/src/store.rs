use crate::clock::{Clock, SystemClock};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::model::Model;
use crate::query::Filter;
use crate::schema::{parse_schema, Schema, SchemaDefinition};
use crate::storage::{FileStorage, Storage};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub const SCHEMA_FILE: &str = "schema.yaml";
pub const CONFIG_FILE: &str = "docmapper.yaml";

/// The main entry point: one storage backend, one clock and the models
/// registered against them.
pub struct Store {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    models: HashMap<String, Model>,
}

impl Store {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Store {
            storage,
            clock: Arc::new(SystemClock),
            models: HashMap::new(),
        }
    }

    /// Replace the clock used by models registered from now on.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Open a data directory.
    ///
    /// When the directory holds a `docmapper.yaml` it decides the backend and
    /// schema location. Otherwise records live as YAML files next to a
    /// required `schema.yaml`.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(Error::Configuration(format!(
                "Data directory does not exist: {}",
                path.display()
            )));
        }

        let config_path = path.join(CONFIG_FILE);
        if config_path.exists() {
            return Store::from_config(&StoreConfig::load(&config_path)?);
        }

        let schema_path = path.join(SCHEMA_FILE);
        if !schema_path.exists() {
            return Err(Error::Configuration(format!(
                "{SCHEMA_FILE} not found in {}",
                path.display()
            )));
        }

        let mut store = Store::new(Arc::new(FileStorage::new(path)));
        store.load_definitions(&parse_schema(&schema_path)?, |_, _| Ok(()))?;
        Ok(store)
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let mut store = Store::new(config.storage.open()?);
        if let Some(schema_path) = &config.schema {
            store.load_definitions(&parse_schema(schema_path)?, |_, _| Ok(()))?;
        }
        Ok(store)
    }

    /// Bind `schema` to `name`. The schema is frozen by registration.
    pub fn register(&mut self, name: &str, schema: Schema) -> Result<Model> {
        if name.is_empty() {
            return Err(Error::Configuration("model name must not be empty".into()));
        }
        if self.models.contains_key(name) {
            return Err(Error::Configuration(format!(
                "model '{name}' is already registered"
            )));
        }
        let model = Model::new(
            name,
            schema,
            Arc::clone(&self.storage),
            Arc::clone(&self.clock),
        );
        log::debug!("registered model '{name}'");
        self.models.insert(name.to_string(), model.clone());
        Ok(model)
    }

    /// Register every model in `definition`. `customize` runs on each schema
    /// before it is frozen, to attach casts, virtuals and hooks from code.
    pub fn load_definitions<F>(&mut self, definition: &SchemaDefinition, mut customize: F) -> Result<()>
    where
        F: FnMut(&str, &mut Schema) -> Result<()>,
    {
        let mut names: Vec<&String> = definition.models.keys().collect();
        names.sort();
        for name in names {
            let mut schema = definition.models[name].to_schema()?;
            customize(name, &mut schema)?;
            self.register(name, schema)?;
        }
        Ok(())
    }

    pub fn model(&self, name: &str) -> Result<Model> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| Error::Configuration(format!("model '{name}' is not registered")))
    }

    /// Registered model names, sorted.
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort();
        names
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Record counts and schema shape per model, plus collections in storage
    /// that no model claims.
    pub async fn status(&self) -> Result<serde_json::Value> {
        let mut models = serde_json::Map::new();
        for name in self.model_names() {
            let model = &self.models[name];
            let count = self.storage.read_many(name, &Filter::new()).await?.len();
            let schema = model.schema();
            models.insert(
                name.to_string(),
                serde_json::json!({
                    "count": count,
                    "fields": schema.fields().map(|(f, _)| f).collect::<Vec<_>>(),
                    "virtuals": schema.virtuals().map(|v| v.name()).collect::<Vec<_>>(),
                    "timestamps": schema.options().timestamps,
                }),
            );
        }

        let unclaimed: Vec<String> = self
            .storage
            .collections()
            .await?
            .into_iter()
            .filter(|c| !self.models.contains_key(c))
            .collect();

        Ok(serde_json::json!({
            "models": models,
            "unclaimed_collections": unclaimed,
        }))
    }
}
