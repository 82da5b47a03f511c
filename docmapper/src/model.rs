// Operation pipelines: save, remove, find-family and update-family

use crate::clock::Clock;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::middleware::{CancelHandle, Invocation, OperationKind};
use crate::query::{
    Filter, Found, QueryContext, QueryOptions, QueryResult, UpdateOutcome, UpdatePayload,
};
use crate::record::{RawRecord, ID_FIELD};
use crate::schema::{Schema, CREATED_AT, UPDATED_AT};
use crate::storage::Storage;
use crate::validation;
use crate::value::format_datetime;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Options for document-level save and remove.
#[derive(Debug, Clone, Default)]
pub struct SaveOptions {
    pub cancel: Option<CancelHandle>,
}

struct ModelInner {
    name: String,
    schema: Arc<Schema>,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

/// A named collection bound to one frozen schema and a storage backend.
/// Cheap to clone; every document holds one.
#[derive(Clone)]
pub struct Model {
    inner: Arc<ModelInner>,
}

impl Model {
    /// Freezes `schema`; no definitions are accepted afterwards.
    pub fn new(
        name: &str,
        mut schema: Schema,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        schema.freeze();
        Model {
            inner: Arc::new(ModelInner {
                name: name.to_string(),
                schema: Arc::new(schema),
                storage,
                clock,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.inner.schema
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.inner.clock
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.inner.storage
    }

    pub fn new_document(&self) -> Document {
        Document::new(self.clone())
    }

    pub fn hydrate(&self, raw: RawRecord) -> Result<Document> {
        Document::hydrate(self, raw)
    }

    fn shape(&self, raw: RawRecord, lean: bool) -> Result<Found> {
        if lean {
            Ok(Found::Lean(raw))
        } else {
            Ok(Found::Hydrated(self.hydrate(raw)?))
        }
    }

    fn now_string(&self) -> String {
        format_datetime(self.inner.clock.now())
    }

    // ── Caller API ───────────────────────────────────────────────────

    /// Build a document from `values` and save it.
    pub async fn create(&self, values: Map<String, Value>) -> Result<Document> {
        let mut doc = self.new_document();
        for (path, value) in values {
            doc.set(&path, value)?;
        }
        doc.save().await?;
        Ok(doc)
    }

    pub async fn find(&self, filter: Filter, options: QueryOptions) -> Result<Vec<Found>> {
        let ctx = QueryContext::new(self.name(), OperationKind::Find, filter, None, options);
        match self.run_query(ctx).await? {
            QueryResult::Many(found) => Ok(found),
            other => Err(unexpected(OperationKind::Find, &other)),
        }
    }

    pub async fn find_one(&self, filter: Filter, options: QueryOptions) -> Result<Option<Found>> {
        let ctx = QueryContext::new(self.name(), OperationKind::FindOne, filter, None, options);
        match self.run_query(ctx).await? {
            QueryResult::One(found) => Ok(found),
            other => Err(unexpected(OperationKind::FindOne, &other)),
        }
    }

    pub async fn find_by_id(&self, id: &str, options: QueryOptions) -> Result<Option<Found>> {
        self.find_one(Filter::by_id(id), options).await
    }

    pub async fn count(&self, filter: Filter) -> Result<usize> {
        let ctx = QueryContext::new(
            self.name(),
            OperationKind::Count,
            filter,
            None,
            QueryOptions::lean(),
        );
        match self.run_query(ctx).await? {
            QueryResult::Count(n) => Ok(n),
            other => Err(unexpected(OperationKind::Count, &other)),
        }
    }

    /// Update the first match. The outcome carries the before or after
    /// snapshot according to `options.return_after_update`.
    pub async fn update_one(
        &self,
        filter: Filter,
        update: UpdatePayload,
        options: QueryOptions,
    ) -> Result<UpdateOutcome> {
        let ctx = QueryContext::new(
            self.name(),
            OperationKind::UpdateOne,
            filter,
            Some(update),
            options,
        );
        match self.run_query(ctx).await? {
            QueryResult::Updated(outcome) => Ok(outcome),
            other => Err(unexpected(OperationKind::UpdateOne, &other)),
        }
    }

    /// Update the first match and return it. `None` when nothing matched.
    pub async fn find_one_and_update(
        &self,
        filter: Filter,
        update: UpdatePayload,
        options: QueryOptions,
    ) -> Result<Option<Found>> {
        let ctx = QueryContext::new(
            self.name(),
            OperationKind::FindOneAndUpdate,
            filter,
            Some(update),
            options,
        );
        match self.run_query(ctx).await? {
            QueryResult::Updated(outcome) => Ok(outcome.document),
            other => Err(unexpected(OperationKind::FindOneAndUpdate, &other)),
        }
    }

    /// Delete every match. Returns how many records were removed.
    pub async fn remove(&self, filter: Filter, options: QueryOptions) -> Result<usize> {
        let ctx = QueryContext::new(self.name(), OperationKind::Remove, filter, None, options);
        match self.run_query(ctx).await? {
            QueryResult::Removed(n) => Ok(n),
            other => Err(unexpected(OperationKind::Remove, &other)),
        }
    }

    // ── Document pipelines ───────────────────────────────────────────

    pub(crate) async fn save_document(&self, doc: &mut Document, options: SaveOptions) -> Result<()> {
        let mut inv = Invocation::new(Arc::clone(self.schema()), OperationKind::Save, options.cancel);
        inv.run_pre_document(doc).await?;
        inv.begin_execution()?;

        doc.populate_defaults();
        if self.schema().options().timestamps {
            let now = self.now_string();
            if doc.is_new() || doc.get_raw(CREATED_AT).is_none() {
                doc.stamp(CREATED_AT, Value::String(now.clone()));
            }
            doc.stamp(UPDATED_AT, Value::String(now));
        }

        let report = validation::validate_document(self.schema(), doc);
        for warning in &report.warnings {
            log::warn!("{}/{}: {warning}", self.name(), doc.id());
        }
        if !report.is_ok() {
            return inv.fail(Error::Validation(report.errors.join("; ")));
        }

        let raw = doc.materialize();
        log::debug!("save {}/{} ({} fields)", self.name(), doc.id(), raw.len());
        if let Err(e) = self.inner.storage.write_one(self.name(), doc.id(), raw).await {
            return inv.fail(e);
        }
        doc.mark_persisted();

        inv.run_post_document(doc).await
    }

    pub(crate) async fn remove_document(
        &self,
        doc: &mut Document,
        options: SaveOptions,
    ) -> Result<()> {
        let mut inv = Invocation::new(Arc::clone(self.schema()), OperationKind::Remove, options.cancel);
        inv.run_pre_document(doc).await?;
        inv.begin_execution()?;

        log::debug!("remove {}/{}", self.name(), doc.id());
        if let Err(e) = self.inner.storage.delete_one(self.name(), doc.id()).await {
            return inv.fail(e);
        }
        doc.mark_removed();

        inv.run_post_document(doc).await
    }

    // ── Query pipelines ──────────────────────────────────────────────

    async fn run_query(&self, mut ctx: QueryContext) -> Result<QueryResult> {
        let mut inv = Invocation::new(
            Arc::clone(self.schema()),
            ctx.kind(),
            ctx.options().cancel.clone(),
        );
        inv.run_pre_query(&mut ctx).await?;
        ctx.seal();
        inv.begin_execution()?;

        let result = match self.execute(&ctx).await {
            Ok(result) => result,
            Err(e) => return inv.fail(e),
        };
        ctx.set_result(result);

        inv.run_post_query(&mut ctx).await?;
        ctx.take_result()
            .ok_or_else(|| Error::Configuration(format!("{} produced no result", ctx.kind())))
    }

    async fn read(&self, filter: &Filter) -> Result<Vec<RawRecord>> {
        log::debug!("read {} ({} clauses)", self.name(), filter.clauses().len());
        self.inner.storage.read_many(self.name(), filter).await
    }

    async fn execute(&self, ctx: &QueryContext) -> Result<QueryResult> {
        let lean = ctx.options().lean;
        match ctx.kind() {
            OperationKind::Find => {
                let mut records = self.read(ctx.filter()).await?;
                if let Some(limit) = ctx.options().limit {
                    records.truncate(limit);
                }
                let found = records
                    .into_iter()
                    .map(|raw| self.shape(raw, lean))
                    .collect::<Result<Vec<_>>>()?;
                Ok(QueryResult::Many(found))
            }
            OperationKind::FindOne => {
                let first = self.read(ctx.filter()).await?.into_iter().next();
                Ok(QueryResult::One(
                    first.map(|raw| self.shape(raw, lean)).transpose()?,
                ))
            }
            OperationKind::Count => Ok(QueryResult::Count(self.read(ctx.filter()).await?.len())),
            OperationKind::UpdateOne | OperationKind::FindOneAndUpdate => {
                Ok(QueryResult::Updated(self.execute_update(ctx).await?))
            }
            OperationKind::Remove => {
                let records = self.read(ctx.filter()).await?;
                let mut removed = 0;
                for raw in &records {
                    let id = raw.id().ok_or_else(|| {
                        Error::Storage(format!("record in '{}' has no '{ID_FIELD}'", self.name()))
                    })?;
                    self.inner.storage.delete_one(self.name(), id).await?;
                    removed += 1;
                }
                Ok(QueryResult::Removed(removed))
            }
            OperationKind::Save => Err(Error::Configuration(
                "save has no query pipeline".into(),
            )),
        }
    }

    async fn execute_update(&self, ctx: &QueryContext) -> Result<UpdateOutcome> {
        let options = ctx.options();
        let empty = UpdatePayload::new();
        let update = ctx.update().unwrap_or(&empty);
        let schema = self.schema();

        let existing = self.read(ctx.filter()).await?.into_iter().next();
        let Some(before) = existing else {
            if !options.upsert {
                return Ok(UpdateOutcome::default());
            }
            return self.upsert(ctx, update).await;
        };

        let id = before
            .id()
            .ok_or_else(|| {
                Error::Storage(format!("record in '{}' has no '{ID_FIELD}'", self.name()))
            })?
            .to_string();

        let mut after = before.clone();
        update.apply(schema, self.name(), &mut after)?;
        let modified = after != before;
        if modified {
            if schema.options().timestamps {
                after.insert(UPDATED_AT, Value::String(self.now_string()));
            }
            log::debug!("update {}/{}", self.name(), id);
            self.inner
                .storage
                .write_one(self.name(), &id, after.clone())
                .await?;
        }

        let snapshot = if options.return_after_update { after } else { before };
        Ok(UpdateOutcome {
            matched: 1,
            modified,
            upserted_id: None,
            document: Some(self.shape(snapshot, options.lean)?),
        })
    }

    async fn upsert(&self, ctx: &QueryContext, update: &UpdatePayload) -> Result<UpdateOutcome> {
        let options = ctx.options();
        let mut doc = self.new_document();
        for (field, value) in ctx.filter().equalities() {
            if field != ID_FIELD {
                doc.set(&field, value)?;
            }
        }
        doc.populate_defaults();

        let mut record = doc.materialize();
        if let Some(Value::String(id)) = ctx.filter().equalities().get(ID_FIELD) {
            record.insert(ID_FIELD, Value::String(id.clone()));
        }
        update.apply(self.schema(), self.name(), &mut record)?;
        if self.schema().options().timestamps {
            let now = Value::String(self.now_string());
            record.insert(CREATED_AT, now.clone());
            record.insert(UPDATED_AT, now);
        }

        let id = record.id().unwrap_or(doc.id()).to_string();
        log::debug!("upsert {}/{}", self.name(), id);
        self.inner
            .storage
            .write_one(self.name(), &id, record.clone())
            .await?;

        let document = if options.return_after_update {
            Some(self.shape(record, options.lean)?)
        } else {
            None
        };
        Ok(UpdateOutcome {
            matched: 0,
            modified: false,
            upserted_id: Some(id),
            document,
        })
    }
}

fn unexpected(kind: OperationKind, result: &QueryResult) -> Error {
    Error::Configuration(format!("{kind} produced an unexpected result: {result:?}"))
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.inner.name)
            .field("schema", &self.inner.schema)
            .field("clock", &self.inner.clock)
            .finish()
    }
}
