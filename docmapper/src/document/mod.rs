// Documents and the hydration engine

use crate::error::{Error, Result};
use crate::model::{Model, SaveOptions};
use crate::record::{RawRecord, ID_FIELD};
use crate::schema::{Schema, CREATED_AT};
use crate::value::DefaultContext;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Controls for [`Document::to_plain`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToPlainOptions {
    pub getters: bool,
    pub virtuals: bool,
}

impl ToPlainOptions {
    pub fn all() -> Self {
        ToPlainOptions {
            getters: true,
            virtuals: true,
        }
    }
}

/// A stored record wrapped with its model's schema.
///
/// Reads go through getters, writes through cast and setters, and virtuals
/// are computed from the current field state. Writes are buffered in memory
/// until [`Document::save`].
pub struct Document {
    model: Model,
    id: String,
    fields: Map<String, Value>,
    /// Defaults resolved by reads of unset fields; dropped once a field is written.
    resolved_defaults: Mutex<Map<String, Value>>,
    created_at: DateTime<Utc>,
    is_new: bool,
    removed: bool,
    modified: BTreeSet<String>,
}

impl Document {
    /// A fresh, unsaved document with a generated id.
    pub(crate) fn new(model: Model) -> Self {
        let id = model.schema().options().id_strategy.generate();
        let created_at = model.clock().now();
        Document {
            model,
            id,
            fields: Map::new(),
            resolved_defaults: Mutex::new(Map::new()),
            created_at,
            is_new: true,
            removed: false,
            modified: BTreeSet::new(),
        }
    }

    /// Build a document from a persisted record. Values are trusted as stored:
    /// no casts, setters or getters run here.
    ///
    /// The creation time comes from the stored `createdAt` when it parses as
    /// RFC 3339; records without one get the clock's current time.
    pub fn hydrate(model: &Model, raw: RawRecord) -> Result<Self> {
        let id = raw
            .id()
            .ok_or_else(|| {
                Error::Storage(format!(
                    "record in '{}' has no '{ID_FIELD}'",
                    model.name()
                ))
            })?
            .to_string();

        let created_at = raw
            .get(CREATED_AT)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| model.clock().now());

        let schema = model.schema();
        let keep_unknown = schema.options().additional_properties;
        let fields = raw
            .into_map()
            .into_iter()
            .filter(|(k, _)| k != ID_FIELD)
            .filter(|(k, _)| keep_unknown || schema.field_definition(k).is_some())
            .collect();

        Ok(Document {
            model: model.clone(),
            id,
            fields,
            resolved_defaults: Mutex::new(Map::new()),
            created_at,
            is_new: false,
            removed: false,
            modified: BTreeSet::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn schema(&self) -> &Arc<Schema> {
        self.model.schema()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn is_modified(&self, path: &str) -> bool {
        self.modified.contains(path)
    }

    pub fn modified_paths(&self) -> impl Iterator<Item = &str> {
        self.modified.iter().map(String::as_str)
    }

    fn default_context(&self) -> DefaultContext {
        DefaultContext {
            created_at: self.created_at,
        }
    }

    fn defaults(&self) -> std::sync::MutexGuard<'_, Map<String, Value>> {
        self.resolved_defaults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Stored value, falling back to the field default (resolved once).
    fn stored_or_default(&self, field: &str) -> Option<Value> {
        if let Some(v) = self.fields.get(field) {
            return Some(v.clone());
        }
        let def = self.schema().field_definition(field)?;
        if !def.has_default() {
            return None;
        }
        let mut cache = self.defaults();
        if let Some(v) = cache.get(field) {
            return Some(v.clone());
        }
        let value = def.default_for(&self.default_context())?;
        cache.insert(field.to_string(), value.clone());
        Some(value)
    }

    /// Read a field (getter applied), a virtual (recomputed), or `_id`.
    pub fn get(&self, path: &str) -> Option<Value> {
        if path == ID_FIELD {
            return Some(Value::String(self.id.clone()));
        }
        let schema = self.schema();
        if let Some(def) = schema.field_definition(path) {
            return self
                .stored_or_default(path)
                .map(|stored| def.apply_getter(stored));
        }
        if let Some(virt) = schema.virtual_definition(path) {
            return Some(virt.get(self));
        }
        self.fields.get(path).cloned()
    }

    /// The stored representation: after setters, before getters. No defaults.
    pub fn get_raw(&self, path: &str) -> Option<&Value> {
        self.fields.get(path)
    }

    /// Assign a field or virtual.
    ///
    /// A field value is cast then passed through the setter. A virtual
    /// decomposes into field assignments that all succeed or none apply.
    pub fn set(&mut self, path: &str, value: Value) -> Result<()> {
        if path == ID_FIELD {
            return Err(Error::Validation(format!("'{ID_FIELD}' is immutable")));
        }
        let schema = Arc::clone(self.schema());

        if let Some(def) = schema.field_definition(path) {
            let stored = def.prepare(path, value)?;
            self.write_field(path, stored);
            return Ok(());
        }

        if let Some(virt) = schema.virtual_definition(path) {
            let mutations = virt.decompose(&value)?;
            let mut staged = Vec::with_capacity(mutations.len());
            for (field, v) in mutations {
                let def = schema.field_definition(&field).ok_or_else(|| {
                    Error::VirtualAssignment {
                        name: path.to_string(),
                        reason: format!("'{field}' is not a stored field"),
                    }
                })?;
                let stored = def.prepare(&field, v)?;
                staged.push((field, stored));
            }
            for (field, stored) in staged {
                self.write_field(&field, stored);
            }
            return Ok(());
        }

        if schema.options().additional_properties {
            self.write_field(path, value);
            return Ok(());
        }

        Err(Error::UnknownField {
            model: self.model.name().to_string(),
            field: path.to_string(),
        })
    }

    /// Remove a stored value; the field's default applies again on read.
    pub fn unset(&mut self, path: &str) {
        if self.fields.remove(path).is_some() {
            self.modified.insert(path.to_string());
        }
        self.defaults().remove(path);
    }

    fn write_field(&mut self, field: &str, stored: Value) {
        self.defaults().remove(field);
        self.fields.insert(field.to_string(), stored);
        self.modified.insert(field.to_string());
    }

    /// Store defaults for every defined field that has no value yet.
    pub(crate) fn populate_defaults(&mut self) {
        let schema = Arc::clone(self.schema());
        for (name, _) in schema.fields() {
            if !self.fields.contains_key(name) {
                if let Some(value) = self.stored_or_default(name) {
                    self.write_field(name, value);
                }
            }
        }
    }

    /// Write a system-maintained value, bypassing cast and setters.
    pub(crate) fn stamp(&mut self, field: &str, value: Value) {
        self.write_field(field, value);
    }

    pub(crate) fn mark_persisted(&mut self) {
        self.is_new = false;
        self.modified.clear();
    }

    pub(crate) fn mark_removed(&mut self) {
        self.removed = true;
    }

    /// Flatten to the record a storage backend persists. Virtuals never appear.
    pub fn materialize(&self) -> RawRecord {
        let mut raw = RawRecord::from(self.fields.clone());
        raw.insert(ID_FIELD, Value::String(self.id.clone()));
        raw
    }

    /// A detached copy of the document's data.
    pub fn to_plain(&self, options: ToPlainOptions) -> Map<String, Value> {
        let mut out = Map::new();
        out.insert(ID_FIELD.to_string(), Value::String(self.id.clone()));

        let schema = self.schema();
        if options.getters {
            for (name, _) in schema.fields() {
                if let Some(v) = self.get(name) {
                    out.insert(name.to_string(), v);
                }
            }
            for (name, v) in &self.fields {
                if schema.field_definition(name).is_none() {
                    out.insert(name.clone(), v.clone());
                }
            }
        } else {
            for (name, v) in &self.fields {
                out.insert(name.clone(), v.clone());
            }
        }

        if options.virtuals {
            for virt in schema.virtuals() {
                out.insert(virt.name().to_string(), virt.get(self));
            }
        }
        out
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    pub async fn save(&mut self) -> Result<()> {
        self.save_with(SaveOptions::default()).await
    }

    pub async fn save_with(&mut self, options: SaveOptions) -> Result<()> {
        let model = self.model.clone();
        model.save_document(self, options).await
    }

    pub async fn remove(&mut self) -> Result<()> {
        self.remove_with(SaveOptions::default()).await
    }

    pub async fn remove_with(&mut self, options: SaveOptions) -> Result<()> {
        let model = self.model.clone();
        model.remove_document(self, options).await
    }
}

impl Clone for Document {
    fn clone(&self) -> Self {
        Document {
            model: self.model.clone(),
            id: self.id.clone(),
            fields: self.fields.clone(),
            resolved_defaults: Mutex::new(self.defaults().clone()),
            created_at: self.created_at,
            is_new: self.is_new,
            removed: self.removed,
            modified: self.modified.clone(),
        }
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("model", &self.model.name())
            .field("id", &self.id)
            .field("fields", &self.fields)
            .field("is_new", &self.is_new)
            .field("modified", &self.modified)
            .finish()
    }
}
