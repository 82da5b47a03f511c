// Query contexts, filter matching and update operators

use crate::document::{Document, ToPlainOptions};
use crate::error::{Error, Result};
use crate::middleware::{CancelHandle, OperationKind};
use crate::record::{RawRecord, ID_FIELD};
use crate::schema::{FieldType, Schema};
use crate::virtuals::VirtualDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

// ── Filters ──────────────────────────────────────────────────────

/// Match criterion for one field path.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Exists(bool),
    Regex(Pattern),
}

/// A regular expression compiled once, when the filter is built.
#[derive(Debug, Clone)]
pub struct Pattern(regex::Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Pattern(regex::Regex::new(pattern)?))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Criterion {
    fn matches(&self, found: Option<&Value>) -> bool {
        match self {
            Criterion::Eq(expected) => value_eq(found, expected),
            Criterion::Ne(expected) => !value_eq(found, expected),
            Criterion::Gt(bound) => compare(found, bound) == Some(Ordering::Greater),
            Criterion::Gte(bound) => matches!(
                compare(found, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Criterion::Lt(bound) => compare(found, bound) == Some(Ordering::Less),
            Criterion::Lte(bound) => matches!(
                compare(found, bound),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Criterion::In(options) => options.iter().any(|o| value_eq(found, o)),
            Criterion::Exists(should) => found.is_some() == *should,
            Criterion::Regex(pattern) => match found {
                Some(Value::String(s)) => pattern.is_match(s),
                _ => false,
            },
        }
    }
}

/// Equality, where an array field also matches any element equal to a scalar.
fn value_eq(found: Option<&Value>, expected: &Value) -> bool {
    match found {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => items.contains(expected),
        Some(v) => numbers_eq(v, expected).unwrap_or(v == expected),
    }
}

fn numbers_eq(a: &Value, b: &Value) -> Option<bool> {
    Some(a.as_f64()? == b.as_f64()?)
}

fn compare(found: Option<&Value>, bound: &Value) -> Option<Ordering> {
    match (found?, bound) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Conjunction of criteria over dotted field paths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Criterion)>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    pub fn by_id(id: &str) -> Self {
        Filter::new().eq(ID_FIELD, Value::String(id.to_string()))
    }

    /// Plain `field: value` pairs, each an equality criterion.
    pub fn from_equalities(map: Map<String, Value>) -> Self {
        map.into_iter()
            .fold(Filter::new(), |f, (field, value)| f.eq(&field, value))
    }

    pub fn and(mut self, field: &str, criterion: Criterion) -> Self {
        self.clauses.push((field.to_string(), criterion));
        self
    }

    pub fn eq(self, field: &str, value: Value) -> Self {
        self.and(field, Criterion::Eq(value))
    }

    pub fn ne(self, field: &str, value: Value) -> Self {
        self.and(field, Criterion::Ne(value))
    }

    pub fn gt(self, field: &str, value: Value) -> Self {
        self.and(field, Criterion::Gt(value))
    }

    pub fn gte(self, field: &str, value: Value) -> Self {
        self.and(field, Criterion::Gte(value))
    }

    pub fn lt(self, field: &str, value: Value) -> Self {
        self.and(field, Criterion::Lt(value))
    }

    pub fn lte(self, field: &str, value: Value) -> Self {
        self.and(field, Criterion::Lte(value))
    }

    pub fn is_in(self, field: &str, values: Vec<Value>) -> Self {
        self.and(field, Criterion::In(values))
    }

    pub fn exists(self, field: &str, present: bool) -> Self {
        self.and(field, Criterion::Exists(present))
    }

    /// Fails when `pattern` is not a valid regular expression.
    pub fn regex(self, field: &str, pattern: &str) -> Result<Self> {
        Ok(self.and(field, Criterion::Regex(Pattern::new(pattern)?)))
    }

    pub fn clauses(&self) -> &[(String, Criterion)] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Top-level equality criteria, used to seed upserted records.
    pub fn equalities(&self) -> Map<String, Value> {
        self.clauses
            .iter()
            .filter(|(field, _)| !field.contains('.'))
            .filter_map(|(field, c)| match c {
                Criterion::Eq(v) => Some((field.clone(), v.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn matches(&self, record: &RawRecord) -> bool {
        self.clauses
            .iter()
            .all(|(field, criterion)| criterion.matches(record.lookup(field)))
    }
}

// ── Update payloads ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOperator {
    Set,
    Unset,
    Inc,
    Push,
}

/// Operator name to field mapping, e.g. `{"set": {"first": "Jane"}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpdatePayload(BTreeMap<UpdateOperator, Map<String, Value>>);

impl UpdatePayload {
    pub fn new() -> Self {
        UpdatePayload::default()
    }

    fn with(mut self, op: UpdateOperator, field: &str, value: Value) -> Self {
        self.0.entry(op).or_default().insert(field.to_string(), value);
        self
    }

    pub fn set(self, field: &str, value: Value) -> Self {
        self.with(UpdateOperator::Set, field, value)
    }

    pub fn unset(self, field: &str) -> Self {
        self.with(UpdateOperator::Unset, field, Value::Bool(true))
    }

    pub fn inc(self, field: &str, by: Value) -> Self {
        self.with(UpdateOperator::Inc, field, by)
    }

    pub fn push(self, field: &str, value: Value) -> Self {
        self.with(UpdateOperator::Push, field, value)
    }

    pub fn operator(&self, op: UpdateOperator) -> Option<&Map<String, Value>> {
        self.0.get(&op)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Map::is_empty)
    }

    /// Apply every operator to `record` in a fixed order (set, unset, inc, push).
    pub(crate) fn apply(&self, schema: &Schema, model: &str, record: &mut RawRecord) -> Result<()> {
        for (op, fields) in &self.0 {
            for (field, value) in fields {
                if field == ID_FIELD {
                    return Err(Error::Validation(format!("'{ID_FIELD}' is immutable")));
                }
                if let Some(virt) = schema.virtual_definition(field) {
                    if *op != UpdateOperator::Set {
                        return Err(Error::VirtualAssignment {
                            name: field.clone(),
                            reason: format!("{op:?} is not supported on a virtual"),
                        });
                    }
                    for (target, stored) in decompose_virtual(schema, virt, value)? {
                        record.insert(target, stored);
                    }
                    continue;
                }
                let def = schema.field_definition(field);
                if def.is_none() && !schema.options().additional_properties {
                    return Err(Error::UnknownField {
                        model: model.to_string(),
                        field: field.clone(),
                    });
                }

                match op {
                    UpdateOperator::Set => {
                        let stored = match def {
                            Some(def) => def.prepare(field, value.clone())?,
                            None => value.clone(),
                        };
                        record.insert(field.clone(), stored);
                    }
                    UpdateOperator::Unset => {
                        record.remove(field);
                    }
                    UpdateOperator::Inc => {
                        if let Some(def) = def {
                            if !matches!(def.field_type, FieldType::Number | FieldType::Mixed) {
                                return Err(Error::Cast {
                                    field: field.clone(),
                                    expected: "number field for inc".into(),
                                    value: def.field_type.to_string(),
                                });
                            }
                        }
                        let by = crate::value::cast_builtin(field, &FieldType::Number, value.clone())?;
                        let current = record.get(field).cloned().unwrap_or(Value::from(0));
                        record.insert(field.clone(), add_numbers(field, &current, &by)?);
                    }
                    UpdateOperator::Push => {
                        if let Some(def) = def {
                            if !matches!(def.field_type, FieldType::List | FieldType::Mixed) {
                                return Err(Error::Cast {
                                    field: field.clone(),
                                    expected: "list field for push".into(),
                                    value: def.field_type.to_string(),
                                });
                            }
                        }
                        // Cast as a one-element list; existing items are left alone.
                        let element = Value::Array(vec![value.clone()]);
                        let prepared = def.map(|def| def.prepare(field, element)).transpose()?;
                        let prepared = match prepared {
                            Some(Value::Array(prepared)) => prepared,
                            Some(other) => vec![other],
                            None => vec![value.clone()],
                        };
                        let mut items = match record.remove(field) {
                            None | Some(Value::Null) => Vec::new(),
                            Some(Value::Array(items)) => items,
                            Some(other) => {
                                return Err(Error::Cast {
                                    field: field.clone(),
                                    expected: "list".into(),
                                    value: other.to_string(),
                                })
                            }
                        };
                        items.extend(prepared);
                        record.insert(field.clone(), Value::Array(items));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Cast every field a virtual assignment targets before any of them is written.
fn decompose_virtual(
    schema: &Schema,
    virt: &VirtualDefinition,
    value: &Value,
) -> Result<Vec<(String, Value)>> {
    virt.decompose(value)?
        .into_iter()
        .map(|(target, raw)| {
            let def = schema
                .field_definition(&target)
                .ok_or_else(|| Error::VirtualAssignment {
                    name: virt.name().to_string(),
                    reason: format!("target '{target}' is not a declared field"),
                })?;
            let stored = def.prepare(&target, raw)?;
            Ok((target, stored))
        })
        .collect()
}

fn add_numbers(field: &str, current: &Value, by: &Value) -> Result<Value> {
    let fail = || Error::Cast {
        field: field.to_string(),
        expected: "number".into(),
        value: current.to_string(),
    };
    if let (Some(a), Some(b)) = (current.as_i64(), by.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Ok(Value::Number(Number::from(sum)));
        }
    }
    let (a, b) = (current.as_f64().ok_or_else(fail)?, by.as_f64().ok_or_else(fail)?);
    Number::from_f64(a + b).map(Value::Number).ok_or_else(fail)
}

// ── Options and context ──────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Skip hydration and return raw records.
    pub lean: bool,
    /// Include virtuals when converting results to plain form.
    pub virtuals: bool,
    /// Apply getters when converting results to plain form.
    pub getters: bool,
    /// For update-family operations, return the record after the update.
    pub return_after_update: bool,
    /// Insert when an update matches nothing.
    pub upsert: bool,
    pub limit: Option<usize>,
    pub cancel: Option<CancelHandle>,
}

impl QueryOptions {
    pub fn lean() -> Self {
        QueryOptions {
            lean: true,
            ..QueryOptions::default()
        }
    }

    pub fn plain_options(&self) -> ToPlainOptions {
        ToPlainOptions {
            getters: self.getters,
            virtuals: self.virtuals,
        }
    }
}

/// One find-family or update-family invocation in flight.
///
/// Pre hooks may replace the filter, the update payload or the options, each
/// through its own mutator. Once execution begins the context is sealed and
/// every mutator fails with [`Error::QuerySealed`].
#[derive(Debug)]
pub struct QueryContext {
    model: String,
    kind: OperationKind,
    filter: Filter,
    update: Option<UpdatePayload>,
    options: QueryOptions,
    sealed: bool,
    result: Option<QueryResult>,
}

impl QueryContext {
    pub fn new(
        model: &str,
        kind: OperationKind,
        filter: Filter,
        update: Option<UpdatePayload>,
        options: QueryOptions,
    ) -> Self {
        QueryContext {
            model: model.to_string(),
            kind,
            filter,
            update,
            options,
            sealed: false,
            result: None,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn update(&self) -> Option<&UpdatePayload> {
        self.update.as_ref()
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.sealed {
            return Err(Error::QuerySealed);
        }
        Ok(())
    }

    pub fn set_filter(&mut self, filter: Filter) -> Result<()> {
        self.ensure_open()?;
        self.filter = filter;
        Ok(())
    }

    /// Replace the update payload wholesale. Never touches the filter.
    pub fn set_update(&mut self, update: UpdatePayload) -> Result<()> {
        self.ensure_open()?;
        self.update = Some(update);
        Ok(())
    }

    pub fn set_options(&mut self, options: QueryOptions) -> Result<()> {
        self.ensure_open()?;
        self.options = options;
        Ok(())
    }

    /// The operation's result, available to post hooks.
    pub fn result(&self) -> Option<&QueryResult> {
        self.result.as_ref()
    }

    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    pub(crate) fn set_result(&mut self, result: QueryResult) {
        self.result = Some(result);
    }

    pub(crate) fn take_result(&mut self) -> Option<QueryResult> {
        self.result.take()
    }
}

// ── Results ──────────────────────────────────────────────────────

/// One query result: a hydrated document, or the raw record in lean mode.
#[derive(Debug, Clone)]
pub enum Found {
    Hydrated(Document),
    Lean(RawRecord),
}

impl Found {
    pub fn id(&self) -> Option<&str> {
        match self {
            Found::Hydrated(doc) => Some(doc.id()),
            Found::Lean(raw) => raw.id(),
        }
    }

    /// Field or virtual value. Lean records carry no virtuals or getters,
    /// so a virtual name yields `None` and fields come back as stored.
    pub fn get(&self, path: &str) -> Option<Value> {
        match self {
            Found::Hydrated(doc) => doc.get(path),
            Found::Lean(raw) => raw.get(path).cloned(),
        }
    }

    pub fn is_lean(&self) -> bool {
        matches!(self, Found::Lean(_))
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Found::Hydrated(doc) => Some(doc),
            Found::Lean(_) => None,
        }
    }

    pub fn into_document(self) -> Option<Document> {
        match self {
            Found::Hydrated(doc) => Some(doc),
            Found::Lean(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&RawRecord> {
        match self {
            Found::Lean(raw) => Some(raw),
            Found::Hydrated(_) => None,
        }
    }

    /// Detached plain form. Options only affect hydrated documents.
    pub fn to_plain(&self, options: ToPlainOptions) -> Map<String, Value> {
        match self {
            Found::Hydrated(doc) => doc.to_plain(options),
            Found::Lean(raw) => raw.fields().clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOutcome {
    pub matched: usize,
    pub modified: bool,
    pub upserted_id: Option<String>,
    /// Before or after snapshot per `return_after_update`; `None` when nothing matched.
    pub document: Option<Found>,
}

#[derive(Debug, Clone)]
pub enum QueryResult {
    Many(Vec<Found>),
    One(Option<Found>),
    Count(usize),
    Updated(UpdateOutcome),
    Removed(usize),
}

impl QueryResult {
    pub fn as_many(&self) -> Option<&[Found]> {
        match self {
            QueryResult::Many(found) => Some(found),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldDefinition;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        RawRecord::try_from(value).unwrap()
    }

    fn people_schema() -> Schema {
        let mut schema = Schema::new();
        schema
            .define("name", FieldDefinition::new(FieldType::String))
            .unwrap()
            .define("age", FieldDefinition::new(FieldType::Number))
            .unwrap()
            .define("tags", FieldDefinition::new(FieldType::List))
            .unwrap();
        schema.freeze();
        schema
    }

    #[test]
    fn test_filter_comparisons() {
        let r = record(json!({ "_id": "1", "name": "Ada", "age": 36, "tags": ["math"] }));

        assert!(Filter::new().eq("name", json!("Ada")).matches(&r));
        assert!(Filter::new().eq("age", json!(36.0)).matches(&r));
        assert!(Filter::new().gt("age", json!(30)).lte("age", json!(36)).matches(&r));
        assert!(!Filter::new().lt("age", json!(36)).matches(&r));
        assert!(Filter::new().eq("tags", json!("math")).matches(&r));
        assert!(Filter::new()
            .is_in("name", vec![json!("Bob"), json!("Ada")])
            .matches(&r));
        assert!(Filter::new().exists("email", false).matches(&r));
        assert!(Filter::new().ne("name", json!("Bob")).matches(&r));
        assert!(Filter::new().regex("name", "^A").unwrap().matches(&r));
        assert!(!Filter::new().regex("name", "^B").unwrap().matches(&r));
        assert!(Filter::by_id("1").matches(&r));
    }

    #[test]
    fn test_filter_dotted_path() {
        let r = record(json!({ "address": { "city": "NYC" } }));
        assert!(Filter::new().eq("address.city", json!("NYC")).matches(&r));
        assert!(!Filter::new().eq("address.city", json!("LA")).matches(&r));
    }

    #[test]
    fn test_bad_regex_fails_when_building_the_filter() {
        assert!(matches!(
            Filter::new().regex("name", "("),
            Err(Error::Regex(_))
        ));
        let a = Filter::new().regex("name", "^A").unwrap();
        let b = Filter::new().regex("name", "^A").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_equalities_seed_upserts() {
        let f = Filter::new()
            .eq("name", json!("Ada"))
            .gt("age", json!(3))
            .eq("address.city", json!("NYC"));
        let seed = f.equalities();
        assert_eq!(seed.len(), 1);
        assert_eq!(seed["name"], json!("Ada"));
    }

    #[test]
    fn test_update_apply_operators() {
        let schema = people_schema();
        let mut r = record(json!({ "_id": "1", "name": "Ada", "age": 36, "tags": ["math"] }));
        UpdatePayload::new()
            .set("name", json!("Ada L."))
            .inc("age", json!("1"))
            .push("tags", json!("engines"))
            .apply(&schema, "people", &mut r)
            .unwrap();

        assert_eq!(r.get("name"), Some(&json!("Ada L.")));
        assert_eq!(r.get("age"), Some(&json!(37)));
        assert_eq!(r.get("tags"), Some(&json!(["math", "engines"])));

        UpdatePayload::new()
            .unset("tags")
            .apply(&schema, "people", &mut r)
            .unwrap();
        assert!(!r.contains("tags"));
    }

    #[test]
    fn test_update_casts_set_values() {
        let schema = people_schema();
        let mut r = record(json!({ "_id": "1" }));
        UpdatePayload::new()
            .set("age", json!("41"))
            .apply(&schema, "people", &mut r)
            .unwrap();
        assert_eq!(r.get("age"), Some(&json!(41)));

        let err = UpdatePayload::new()
            .set("age", json!("old"))
            .apply(&schema, "people", &mut r)
            .unwrap_err();
        assert!(matches!(err, Error::Cast { .. }));
    }

    #[test]
    fn test_update_rejects_id_and_unknown_fields() {
        let schema = people_schema();
        let mut r = record(json!({ "_id": "1" }));
        assert!(matches!(
            UpdatePayload::new().set(ID_FIELD, json!("2")).apply(&schema, "people", &mut r),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            UpdatePayload::new().set("nickname", json!("x")).apply(&schema, "people", &mut r),
            Err(Error::UnknownField { .. })
        ));
        assert!(UpdatePayload::new()
            .inc("name", json!(1))
            .apply(&schema, "people", &mut r)
            .is_err());
    }

    #[test]
    fn test_update_set_on_virtual_writes_backing_fields() {
        let mut schema = Schema::with_options(crate::schema::SchemaOptions {
            additional_properties: true,
            ..Default::default()
        });
        schema
            .define("first", FieldDefinition::new(FieldType::String))
            .unwrap()
            .define("last", FieldDefinition::new(FieldType::String))
            .unwrap()
            .define_virtual(VirtualDefinition::joined("fullName", " ", "first", "last"))
            .unwrap()
            .define_virtual(VirtualDefinition::new("initial", |_| json!("A")))
            .unwrap();
        schema.freeze();

        let mut r = record(json!({ "_id": "1", "first": "Ada", "last": "L" }));
        UpdatePayload::new()
            .set("fullName", json!("Jane Smith"))
            .apply(&schema, "people", &mut r)
            .unwrap();
        assert_eq!(r, record(json!({ "_id": "1", "first": "Jane", "last": "Smith" })));

        let before = r.clone();
        for update in [
            UpdatePayload::new().set("fullName", json!("Jane")),
            UpdatePayload::new().set("initial", json!("B")),
            UpdatePayload::new().unset("fullName"),
            UpdatePayload::new().push("fullName", json!("x")),
        ] {
            assert!(matches!(
                update.apply(&schema, "people", &mut r),
                Err(Error::VirtualAssignment { .. })
            ));
            assert_eq!(r, before);
        }
    }

    #[test]
    fn test_update_push_casts_the_new_element() {
        let mut schema = Schema::new();
        schema
            .define(
                "tags",
                FieldDefinition::new(FieldType::List).cast_with(|v| match v {
                    Value::Array(items) => items
                        .iter()
                        .map(|item| match item.as_str() {
                            Some(s) => Ok(json!(s.to_lowercase())),
                            None => Err("list of strings".to_string()),
                        })
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map(Value::Array),
                    _ => Err("list of strings".to_string()),
                }),
            )
            .unwrap();
        schema.freeze();

        let mut r = record(json!({ "_id": "1", "tags": ["a"] }));
        UpdatePayload::new()
            .push("tags", json!("B"))
            .apply(&schema, "posts", &mut r)
            .unwrap();
        assert_eq!(r.get("tags"), Some(&json!(["a", "b"])));

        let err = UpdatePayload::new()
            .push("tags", json!({ "not": "a string" }))
            .apply(&schema, "posts", &mut r)
            .unwrap_err();
        assert!(matches!(err, Error::Cast { .. }));
        assert_eq!(r.get("tags"), Some(&json!(["a", "b"])));
    }

    #[test]
    fn test_update_payload_serde_shape() {
        let payload: UpdatePayload =
            serde_json::from_value(json!({ "set": { "name": "Ada" }, "inc": { "age": 1 } }))
                .unwrap();
        assert_eq!(payload.operator(UpdateOperator::Set).unwrap()["name"], json!("Ada"));
        assert_eq!(payload.operator(UpdateOperator::Inc).unwrap()["age"], json!(1));
        assert!(!payload.is_empty());
        assert!(UpdatePayload::new().is_empty());
    }

    #[test]
    fn test_context_mutators_separate_and_sealable() {
        let mut ctx = QueryContext::new(
            "people",
            OperationKind::UpdateOne,
            Filter::new().eq("name", json!("Ada")),
            Some(UpdatePayload::new().set("age", json!(1))),
            QueryOptions::default(),
        );

        ctx.set_update(UpdatePayload::new().set("age", json!(2))).unwrap();
        assert_eq!(ctx.filter(), &Filter::new().eq("name", json!("Ada")));
        assert_eq!(
            ctx.update().unwrap().operator(UpdateOperator::Set).unwrap()["age"],
            json!(2)
        );

        ctx.seal();
        assert!(matches!(ctx.set_filter(Filter::new()), Err(Error::QuerySealed)));
        assert!(matches!(
            ctx.set_update(UpdatePayload::new()),
            Err(Error::QuerySealed)
        ));
        assert!(matches!(
            ctx.set_options(QueryOptions::lean()),
            Err(Error::QuerySealed)
        ));
    }
}
