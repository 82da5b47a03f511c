use super::types::{AutoIdStrategy, FieldType};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::middleware::{HookBody, HookPhase, HookScope, OperationKind};
use crate::query::QueryContext;
use crate::record::ID_FIELD;
use crate::value::FieldDefinition;
use crate::virtuals::VirtualDefinition;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

#[derive(Debug, Clone, Default)]
pub struct SchemaOptions {
    pub id_strategy: AutoIdStrategy,
    /// Maintain `createdAt` / `updatedAt` on save.
    pub timestamps: bool,
    /// Keep fields the schema does not define instead of rejecting them.
    pub additional_properties: bool,
}

/// Field definitions, virtuals and middleware for one model.
///
/// Mutable until [`Schema::freeze`]; read-only afterwards and shared behind
/// an `Arc` by every document of the model.
#[derive(Default)]
pub struct Schema {
    fields: BTreeMap<String, FieldDefinition>,
    virtuals: BTreeMap<String, VirtualDefinition>,
    hooks: HashMap<(OperationKind, HookPhase), Vec<HookBody>>,
    options: SchemaOptions,
    frozen: bool,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    pub fn with_options(options: SchemaOptions) -> Self {
        Schema {
            options,
            ..Schema::default()
        }
    }

    fn ensure_mutable(&self, what: &str) -> Result<()> {
        if self.frozen {
            return Err(Error::Configuration(format!(
                "cannot {what}: schema is frozen"
            )));
        }
        Ok(())
    }

    fn ensure_free_name(&self, name: &str) -> Result<()> {
        if name.is_empty() || name == ID_FIELD {
            return Err(Error::Configuration(format!(
                "'{name}' is not a definable name"
            )));
        }
        if self.fields.contains_key(name) {
            return Err(Error::Configuration(format!(
                "'{name}' is already defined as a field"
            )));
        }
        if self.virtuals.contains_key(name) {
            return Err(Error::Configuration(format!(
                "'{name}' is already defined as a virtual"
            )));
        }
        Ok(())
    }

    pub fn define(&mut self, name: &str, definition: FieldDefinition) -> Result<&mut Self> {
        self.ensure_mutable("define a field")?;
        self.ensure_free_name(name)?;
        self.fields.insert(name.to_string(), definition);
        Ok(self)
    }

    pub fn define_virtual(&mut self, definition: VirtualDefinition) -> Result<&mut Self> {
        self.ensure_mutable("define a virtual")?;
        self.ensure_free_name(definition.name())?;
        self.virtuals.insert(definition.name().to_string(), definition);
        Ok(self)
    }

    pub fn register_hook(
        &mut self,
        kind: OperationKind,
        phase: HookPhase,
        body: HookBody,
    ) -> Result<&mut Self> {
        self.ensure_mutable("register a hook")?;
        let scope = body.scope();
        if !kind.accepts(scope) {
            return Err(Error::Configuration(format!(
                "'{kind}' has no {scope}-scoped middleware"
            )));
        }
        self.hooks.entry((kind, phase)).or_default().push(body);
        Ok(self)
    }

    /// Register a document-scoped pre hook.
    pub fn pre<F>(&mut self, kind: OperationKind, hook: F) -> Result<&mut Self>
    where
        F: Fn(&mut Document) -> Result<()> + Send + Sync + 'static,
    {
        self.register_hook(kind, HookPhase::Pre, HookBody::document(hook))
    }

    /// Register a document-scoped post hook.
    pub fn post<F>(&mut self, kind: OperationKind, hook: F) -> Result<&mut Self>
    where
        F: Fn(&mut Document) -> Result<()> + Send + Sync + 'static,
    {
        self.register_hook(kind, HookPhase::Post, HookBody::document(hook))
    }

    /// Register a query-scoped pre hook.
    pub fn pre_query<F>(&mut self, kind: OperationKind, hook: F) -> Result<&mut Self>
    where
        F: Fn(&mut QueryContext) -> Result<()> + Send + Sync + 'static,
    {
        self.register_hook(kind, HookPhase::Pre, HookBody::query(hook))
    }

    /// Register a query-scoped post hook.
    pub fn post_query<F>(&mut self, kind: OperationKind, hook: F) -> Result<&mut Self>
    where
        F: Fn(&mut QueryContext) -> Result<()> + Send + Sync + 'static,
    {
        self.register_hook(kind, HookPhase::Post, HookBody::query(hook))
    }

    /// Stop accepting definitions. Adds timestamp fields when enabled.
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        if self.options.timestamps {
            for name in [CREATED_AT, UPDATED_AT] {
                if !self.virtuals.contains_key(name) {
                    self.fields
                        .entry(name.to_string())
                        .or_insert_with(|| FieldDefinition::new(FieldType::Datetime));
                }
            }
        }
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    // ── Lookups ──────────────────────────────────────────────────────

    pub fn field_definition(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDefinition)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn virtual_definition(&self, name: &str) -> Option<&VirtualDefinition> {
        self.virtuals.get(name)
    }

    pub fn virtuals(&self) -> impl Iterator<Item = &VirtualDefinition> {
        self.virtuals.values()
    }

    pub fn hooks_for(&self, kind: OperationKind, phase: HookPhase) -> &[HookBody] {
        self.hooks
            .get(&(kind, phase))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Hooks of one scope, in registration order.
    pub fn scoped_hooks(
        &self,
        kind: OperationKind,
        phase: HookPhase,
        scope: HookScope,
    ) -> impl Iterator<Item = &HookBody> {
        self.hooks_for(kind, phase)
            .iter()
            .filter(move |h| h.scope() == scope)
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("fields", &self.fields)
            .field("virtuals", &self.virtuals.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks.values().map(Vec::len).sum::<usize>())
            .field("options", &self.options)
            .field("frozen", &self.frozen)
            .finish()
    }
}
