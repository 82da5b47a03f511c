use docmapper::schema::FieldType;
use docmapper::testing::{ManualClock, RecordingStorage};
use docmapper::value::format_datetime;
use docmapper::{
    CancelHandle, Error, FieldDefinition, Filter, Found, Model, OperationKind, QueryOptions,
    QueryResult, RawRecord, SaveOptions, Schema, SchemaOptions, ToPlainOptions, UpdatePayload,
    VirtualDefinition,
};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

fn person_schema() -> Schema {
    let mut schema = Schema::new();
    schema
        .define("first", FieldDefinition::new(FieldType::String))
        .unwrap()
        .define("last", FieldDefinition::new(FieldType::String))
        .unwrap()
        .define("age", FieldDefinition::new(FieldType::Number))
        .unwrap()
        .define_virtual(VirtualDefinition::joined("fullName", " ", "first", "last"))
        .unwrap();
    schema
}

fn person_model(schema: Schema) -> (Arc<RecordingStorage>, Model) {
    let storage = Arc::new(RecordingStorage::new());
    let model = Model::new(
        "people",
        schema,
        storage.clone(),
        Arc::new(ManualClock::default()),
    );
    (storage, model)
}

fn raw(value: Value) -> RawRecord {
    RawRecord::try_from(value).unwrap()
}

async fn seed_three(storage: &RecordingStorage) {
    storage
        .seed(
            "people",
            vec![
                raw(json!({ "_id": "1", "first": "Ada", "last": "Lovelace", "age": 36 })),
                raw(json!({ "_id": "2", "first": "Alan", "last": "Turing", "age": 41 })),
                raw(json!({ "_id": "3", "first": "Grace", "last": "Hopper", "age": 85 })),
            ],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_plain_form_of_hydrated_record_matches_stored_fields() {
    let (storage, model) = person_model(person_schema());
    seed_three(&storage).await;

    let found = model.find(Filter::new(), QueryOptions::default()).await.unwrap();
    assert_eq!(found.len(), 3);
    for f in &found {
        let doc = f.as_document().unwrap();
        let stored = storage.record("people", doc.id()).unwrap();
        assert_eq!(&doc.to_plain(ToPlainOptions::default()), stored.fields());
    }
}

#[tokio::test]
async fn test_lean_results_have_no_virtuals_or_persistence() {
    let (storage, model) = person_model(person_schema());
    seed_three(&storage).await;

    let found = model
        .find_by_id("1", QueryOptions::lean())
        .await
        .unwrap()
        .unwrap();
    assert!(found.is_lean());
    assert_eq!(found.get("fullName"), None);
    assert_eq!(found.get("first"), Some(json!("Ada")));
    assert!(found.as_document().is_none());
    assert!(found.into_document().is_none());

    let hydrated = model
        .find_by_id("1", QueryOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hydrated.get("fullName"), Some(json!("Ada Lovelace")));
}

#[tokio::test]
async fn test_pre_save_abort_skips_write_and_post_hooks() {
    let post_ran = Arc::new(Mutex::new(false));
    let flag = post_ran.clone();
    let mut schema = person_schema();
    schema
        .pre(OperationKind::Save, |doc| {
            if doc.get("age").and_then(|v| v.as_i64()).unwrap_or(0) < 0 {
                return Err(Error::abort("age must not be negative"));
            }
            Ok(())
        })
        .unwrap()
        .post(OperationKind::Save, move |_| {
            *flag.lock().unwrap() = true;
            Ok(())
        })
        .unwrap();
    let (storage, model) = person_model(schema);

    let mut doc = model.new_document();
    doc.set("first", json!("Ada")).unwrap();
    doc.set("age", json!(-1)).unwrap();
    let err = doc.save().await.unwrap_err();

    assert!(matches!(err, Error::HookAbort { .. }));
    assert_eq!(storage.writes(), 0);
    assert!(!*post_ran.lock().unwrap());
    assert!(doc.is_new());
}

#[tokio::test]
async fn test_virtual_tracks_backing_fields() {
    let (_storage, model) = person_model(person_schema());
    let mut doc = model.new_document();
    doc.set("first", json!("Jane")).unwrap();
    doc.set("last", json!("Smith")).unwrap();
    assert_eq!(doc.get("fullName"), Some(json!("Jane Smith")));

    doc.set("last", json!("Doe")).unwrap();
    assert_eq!(doc.get("fullName"), Some(json!("Jane Doe")));
}

#[tokio::test]
async fn test_full_name_assignment() {
    let (storage, model) = person_model(person_schema());
    let mut doc = model.new_document();

    doc.set("fullName", json!("Jane Smith")).unwrap();
    assert_eq!(doc.get("first"), Some(json!("Jane")));
    assert_eq!(doc.get("last"), Some(json!("Smith")));

    let err = doc.set("fullName", json!("Jane")).unwrap_err();
    assert!(matches!(err, Error::VirtualAssignment { .. }));
    assert_eq!(doc.get("last"), Some(json!("Smith")));

    doc.save().await.unwrap();
    let stored = storage.record("people", doc.id()).unwrap();
    assert!(!stored.contains("fullName"));
}

#[tokio::test]
async fn test_update_one_through_a_virtual_stores_only_backing_fields() {
    let mut schema = Schema::with_options(SchemaOptions {
        additional_properties: true,
        ..Default::default()
    });
    schema
        .define("first", FieldDefinition::new(FieldType::String))
        .unwrap()
        .define("last", FieldDefinition::new(FieldType::String))
        .unwrap()
        .define_virtual(VirtualDefinition::joined("fullName", " ", "first", "last"))
        .unwrap();
    let (storage, model) = person_model(schema);
    storage
        .seed("people", vec![raw(json!({ "_id": "1", "first": "Ada", "last": "L" }))])
        .await
        .unwrap();

    let outcome = model
        .update_one(
            Filter::by_id("1"),
            UpdatePayload::new().set("fullName", json!("Jane Smith")),
            QueryOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.matched, 1);

    let stored = storage.record("people", "1").unwrap();
    assert!(!stored.contains("fullName"));
    assert_eq!(stored.get("first"), Some(&json!("Jane")));
    assert_eq!(stored.get("last"), Some(&json!("Smith")));
}

#[tokio::test]
async fn test_find_hooks_bracket_the_storage_read() {
    let reads_at_pre = Arc::new(Mutex::new(None));
    let observed = Arc::new(Mutex::new(None));
    let storage = Arc::new(RecordingStorage::new());
    seed_three(&storage).await;

    let mut schema = person_schema();
    let (pre_storage, pre_slot) = (storage.clone(), reads_at_pre.clone());
    let (post_storage, post_slot) = (storage.clone(), observed.clone());
    schema
        .pre_query(OperationKind::Find, move |_| {
            *pre_slot.lock().unwrap() = Some(pre_storage.reads());
            Ok(())
        })
        .unwrap()
        .post_query(OperationKind::Find, move |q| {
            let lean = q
                .result()
                .and_then(QueryResult::as_many)
                .map(|found| (found.len(), found.iter().all(Found::is_lean)));
            *post_slot.lock().unwrap() = lean.map(|l| (l, post_storage.reads()));
            Ok(())
        })
        .unwrap();
    let model = Model::new(
        "people",
        schema,
        storage.clone(),
        Arc::new(ManualClock::default()),
    );

    let found = model.find(Filter::new(), QueryOptions::default()).await.unwrap();
    assert_eq!(found.len(), 3);
    assert_eq!(*reads_at_pre.lock().unwrap(), Some(0));
    assert_eq!(*observed.lock().unwrap(), Some(((3, false), 1)));

    model.find(Filter::new(), QueryOptions::lean()).await.unwrap();
    assert_eq!(*observed.lock().unwrap(), Some(((3, true), 2)));
}

#[tokio::test]
async fn test_update_one_returns_after_or_before() {
    let (storage, model) = person_model(person_schema());
    seed_three(&storage).await;

    let after = model
        .update_one(
            Filter::by_id("2"),
            UpdatePayload::new()
                .set("first", json!("Alonzo"))
                .set("last", json!("Church")),
            QueryOptions {
                return_after_update: true,
                ..QueryOptions::default()
            },
        )
        .await
        .unwrap();
    let doc = after.document.unwrap();
    assert_eq!(doc.get("first"), Some(json!("Alonzo")));
    assert_eq!(doc.get("last"), Some(json!("Church")));
    assert_eq!(doc.get("fullName"), Some(json!("Alonzo Church")));

    let before = model
        .update_one(
            Filter::by_id("2"),
            UpdatePayload::new().set("first", json!("Kurt")),
            QueryOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(before.document.unwrap().get("first"), Some(json!("Alonzo")));
    assert_eq!(
        storage.record("people", "2").unwrap().get("first"),
        Some(&json!("Kurt"))
    );
}

#[tokio::test]
async fn test_creation_time_default_follows_the_clock() {
    let clock = Arc::new(ManualClock::default());
    let mut schema = Schema::new();
    schema
        .define(
            "joined",
            FieldDefinition::new(FieldType::Datetime)
                .default_with(|ctx| json!(format_datetime(ctx.created_at))),
        )
        .unwrap();
    let model = Model::new(
        "members",
        schema,
        Arc::new(RecordingStorage::new()),
        clock.clone(),
    );

    let first = model.new_document();
    clock.advance(chrono::Duration::seconds(1));
    let second = model.new_document();

    let (a, b) = (first.get("joined").unwrap(), second.get("joined").unwrap());
    assert_ne!(a, b);
    assert_eq!(first.get("joined").unwrap(), a);
}

#[tokio::test]
async fn test_storage_error_reaches_caller_after_pre_hooks() {
    let pre_count = Arc::new(Mutex::new(0));
    let counter = pre_count.clone();
    let mut schema = person_schema();
    schema
        .pre(OperationKind::Save, move |_| {
            *counter.lock().unwrap() += 1;
            Ok(())
        })
        .unwrap();
    let (storage, model) = person_model(schema);
    storage.fail_writes(true);

    let err = model
        .create(json!({ "first": "Ada" }).as_object().cloned().unwrap())
        .await
        .unwrap_err();
    assert!(err.is_storage());
    assert_eq!(*pre_count.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_post_find_failure_is_reported() {
    let mut schema = person_schema();
    schema
        .post_query(OperationKind::Find, |_| Err(Error::abort("audit log offline")))
        .unwrap();
    let (storage, model) = person_model(schema);
    seed_three(&storage).await;

    let err = model
        .find(Filter::new(), QueryOptions::default())
        .await
        .unwrap_err();
    match err {
        Error::PostHook { operation, source } => {
            assert_eq!(operation, "find");
            assert!(matches!(*source, Error::HookAbort { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_cancelled_find_never_reads() {
    let (storage, model) = person_model(person_schema());
    let cancel = CancelHandle::new();
    cancel.cancel();

    let err = model
        .find(
            Filter::new(),
            QueryOptions {
                cancel: Some(cancel.clone()),
                ..QueryOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Cancelled {
            storage_applied: false,
            ..
        }
    ));
    assert_eq!(storage.reads(), 0);

    let mut doc = model.new_document();
    doc.set("first", json!("Ada")).unwrap();
    assert!(doc
        .save_with(SaveOptions {
            cancel: Some(cancel)
        })
        .await
        .is_err());
    assert_eq!(storage.writes(), 0);
}

#[tokio::test]
async fn test_find_one_and_update_without_match_is_none() {
    let (storage, model) = person_model(person_schema());
    seed_three(&storage).await;
    let found = model
        .find_one_and_update(
            Filter::new().eq("first", json!("Nobody")),
            UpdatePayload::new().inc("age", json!(1)),
            QueryOptions::default(),
        )
        .await
        .unwrap();
    assert!(found.is_none());
}
