//! Tests for draft resolution

use super::*;
use crate::db::{MemoryStore, PaginatedDocs, Pagination, StoreQuery};
use crate::models::{Field, FieldKind, Record};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;

/// Memory store that remembers the queries it was asked to run
#[derive(Default)]
struct RecordingStore {
    inner: MemoryStore,
    queries: Mutex<Vec<StoreQuery>>,
    options: Mutex<Vec<FindOptions>>,
}

impl RecordingStore {
    fn last_query(&self) -> StoreQuery {
        self.queries.lock().unwrap().last().cloned().unwrap()
    }

    fn last_options(&self) -> FindOptions {
        self.options.lock().unwrap().last().cloned().unwrap()
    }

    fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn register_collection(&self, collection: &str, localized_paths: Vec<String>) -> Result<(), StoreError> {
        self.inner.register_collection(collection, localized_paths).await
    }

    async fn build_query(
        &self,
        collection: &str,
        predicate: Option<&Predicate>,
        locale: Option<&str>,
    ) -> Result<StoreQuery, StoreError> {
        let query = self.inner.build_query(collection, predicate, locale).await?;
        self.queries.lock().unwrap().push(query.clone());
        Ok(query)
    }

    async fn find_one(&self, query: &StoreQuery, options: &FindOptions) -> Result<Option<Record>, StoreError> {
        self.options.lock().unwrap().push(options.clone());
        self.inner.find_one(query, options).await
    }

    async fn find(
        &self,
        query: &StoreQuery,
        options: &FindOptions,
        pagination: Option<Pagination>,
    ) -> Result<PaginatedDocs<Record>, StoreError> {
        self.inner.find(query, options, pagination).await
    }

    async fn insert(&self, collection: &str, record: Record) -> Result<Record, StoreError> {
        self.inner.insert(collection, record).await
    }

    async fn update(&self, collection: &str, id: &str, record: Record) -> Result<Record, StoreError> {
        self.inner.update(collection, id, record).await
    }

    async fn delete_many(&self, query: &StoreQuery) -> Result<usize, StoreError> {
        self.inner.delete_many(query).await
    }
}

/// Store whose every query fails
struct UnavailableStore;

#[async_trait]
impl DocumentStore for UnavailableStore {
    async fn register_collection(&self, _: &str, _: Vec<String>) -> Result<(), StoreError> {
        Ok(())
    }

    async fn build_query(&self, collection: &str, _: Option<&Predicate>, _: Option<&str>) -> Result<StoreQuery, StoreError> {
        Ok(StoreQuery {
            collection: collection.to_string(),
            filter: None,
            locale: None,
        })
    }

    async fn find_one(&self, _: &StoreQuery, _: &FindOptions) -> Result<Option<Record>, StoreError> {
        Err(StoreError::unavailable("connection reset"))
    }

    async fn find(&self, _: &StoreQuery, _: &FindOptions, _: Option<Pagination>) -> Result<PaginatedDocs<Record>, StoreError> {
        Err(StoreError::unavailable("connection reset"))
    }

    async fn insert(&self, _: &str, _: Record) -> Result<Record, StoreError> {
        Err(StoreError::unavailable("connection reset"))
    }

    async fn update(&self, _: &str, _: &str, _: Record) -> Result<Record, StoreError> {
        Err(StoreError::unavailable("connection reset"))
    }

    async fn delete_many(&self, _: &StoreQuery) -> Result<usize, StoreError> {
        Err(StoreError::unavailable("connection reset"))
    }
}

const T0: &str = "2024-03-01T12:00:00Z";

fn pages() -> EntityConfig {
    EntityConfig::new(
        "pages",
        vec![Field::new("title", FieldKind::Text), Field::new("visibility", FieldKind::Text)],
    )
    .with_drafts()
}

fn published(id: &str) -> Document {
    let mut data = serde_json::Map::new();
    data.insert("title".to_string(), json!("Published"));
    data.insert("_status".to_string(), json!("published"));
    Document::with_timestamps(id, data, "2024-01-01T00:00:00Z".parse().unwrap(), T0.parse().unwrap())
}

fn object(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

async fn seeded_store() -> RecordingStore {
    let store = RecordingStore::default();
    store
        .register_collection(&pages().versions_collection(), vec![])
        .await
        .unwrap();
    store
}

async fn add_version(store: &dyn DocumentStore, parent: Option<&str>, status: &str, updated_at: &str, version: Value) {
    let mut snapshot = object(version);
    snapshot.insert("_status".to_string(), json!(status));

    let mut record = object(json!({
        "version": snapshot,
        "createdAt": updated_at,
        "updatedAt": updated_at,
    }));
    if let Some(parent) = parent {
        record.insert("parent".to_string(), json!(parent));
    }
    store.insert("_pages_versions", record).await.unwrap();
}

// =========================================================================
// Pass-through
// =========================================================================

#[tokio::test]
async fn test_document_without_timestamps_passes_through() {
    let store = seeded_store().await;
    let doc = Document::new("1");

    let resolved = resolve_draft(&store, &pages(), EntityKind::Collection, &doc, None, &AccessResult::Unrestricted)
        .await
        .unwrap();

    assert_eq!(resolved, doc);
    assert_eq!(store.query_count(), 0);
}

#[tokio::test]
async fn test_no_draft_returns_document_unchanged() {
    let store = seeded_store().await;
    let doc = published("1");

    let resolved = resolve_draft(&store, &pages(), EntityKind::Collection, &doc, None, &AccessResult::Unrestricted)
        .await
        .unwrap();

    assert_eq!(resolved, doc);
    assert_eq!(store.query_count(), 1);
}

#[tokio::test]
async fn test_denied_access_never_reads_drafts() {
    let store = seeded_store().await;
    add_version(&store, Some("1"), "draft", "2024-03-02T00:00:00Z", json!({ "title": "Draft" })).await;
    let doc = published("1");

    let resolved = resolve_draft(&store, &pages(), EntityKind::Collection, &doc, None, &AccessResult::Denied)
        .await
        .unwrap();

    assert_eq!(resolved, doc);
    assert_eq!(store.query_count(), 0);
}

// =========================================================================
// Overlay
// =========================================================================

#[tokio::test]
async fn test_newer_draft_overlays_document() {
    let store = seeded_store().await;
    add_version(
        &store,
        Some("1"),
        "draft",
        "2024-03-02T00:00:00Z",
        json!({ "id": "stale-id", "title": "Draft title", "createdAt": "1999-01-01T00:00:00Z" }),
    )
    .await;
    let doc = published("1");
    let before = doc.clone();

    let resolved = resolve_draft(&store, &pages(), EntityKind::Collection, &doc, None, &AccessResult::Unrestricted)
        .await
        .unwrap();

    assert_eq!(resolved.id, "1");
    assert_eq!(resolved.data["title"], "Draft title");
    assert_eq!(resolved.data["_status"], "draft");
    assert_eq!(resolved.updated_at, Some("2024-03-02T00:00:00Z".parse().unwrap()));
    assert_eq!(resolved.created_at, Some("2024-03-02T00:00:00Z".parse().unwrap()));
    assert!(!resolved.data.contains_key("id"));
    assert!(!resolved.data.contains_key("_seq"));
    assert!(!resolved.data.contains_key("__v"));
    assert_eq!(doc, before);
}

#[tokio::test]
async fn test_stale_drafts_never_override() {
    let store = seeded_store().await;
    add_version(&store, Some("1"), "draft", T0, json!({ "title": "Same instant" })).await;
    add_version(&store, Some("1"), "draft", "2024-02-01T00:00:00Z", json!({ "title": "Older" })).await;
    let doc = published("1");

    let resolved = resolve_draft(&store, &pages(), EntityKind::Collection, &doc, None, &AccessResult::Unrestricted)
        .await
        .unwrap();

    assert_eq!(resolved, doc);
}

#[tokio::test]
async fn test_only_drafts_of_this_document_count() {
    let store = seeded_store().await;
    add_version(&store, Some("2"), "draft", "2024-03-05T00:00:00Z", json!({ "title": "Other doc" })).await;
    add_version(&store, Some("1"), "published", "2024-03-05T00:00:00Z", json!({ "title": "Published later" })).await;
    let doc = published("1");

    let resolved = resolve_draft(&store, &pages(), EntityKind::Collection, &doc, None, &AccessResult::Unrestricted)
        .await
        .unwrap();

    assert_eq!(resolved, doc);
}

#[tokio::test]
async fn test_newest_draft_wins_and_ties_go_to_latest_inserted() {
    let store = seeded_store().await;
    add_version(&store, Some("1"), "draft", "2024-03-02T00:00:00Z", json!({ "title": "Older draft" })).await;
    add_version(&store, Some("1"), "draft", "2024-03-03T00:00:00Z", json!({ "title": "Tie A" })).await;
    add_version(&store, Some("1"), "draft", "2024-03-03T00:00:00Z", json!({ "title": "Tie B" })).await;
    let doc = published("1");

    let resolved = resolve_draft(&store, &pages(), EntityKind::Collection, &doc, None, &AccessResult::Unrestricted)
        .await
        .unwrap();

    assert_eq!(resolved.data["title"], "Tie B");
}

// =========================================================================
// Query Shape
// =========================================================================

#[tokio::test]
async fn test_query_targets_versions_sorted_newest_first() {
    let store = seeded_store().await;
    let doc = published("1");

    resolve_draft(&store, &pages(), EntityKind::Collection, &doc, Some("en"), &AccessResult::Unrestricted)
        .await
        .unwrap();

    let query = store.last_query();
    assert_eq!(query.collection, "_pages_versions");
    assert_eq!(query.locale.as_deref(), Some("en"));

    let paths: Vec<String> = query
        .filter
        .unwrap()
        .flatten()
        .iter()
        .map(|c| format!("{} {}", c.path, c.operator))
        .collect();
    assert_eq!(
        paths,
        vec![
            "parent equals",
            "version._status equals",
            "updatedAt greater_than"
        ]
    );

    let options = store.last_options();
    assert!(options.lean);
    assert!(!options.use_estimated_count);
    assert_eq!(options.sort, vec![SortKey::desc("updatedAt")]);
}

#[tokio::test]
async fn test_globals_have_no_parent_constraint() {
    let store = seeded_store().await;
    add_version(&store, None, "draft", "2024-03-02T00:00:00Z", json!({ "title": "Global draft" })).await;
    let doc = published("global-doc");

    let resolved = resolve_draft(&store, &pages(), EntityKind::Global, &doc, None, &AccessResult::Unrestricted)
        .await
        .unwrap();

    assert_eq!(resolved.data["title"], "Global draft");
    assert_eq!(resolved.id, "global-doc");
    assert!(store
        .last_query()
        .filter
        .unwrap()
        .flatten()
        .iter()
        .all(|c| c.path != "parent"));
}

#[tokio::test]
async fn test_scoped_access_is_applied_to_version_fields() {
    let store = seeded_store().await;
    add_version(
        &store,
        Some("1"),
        "draft",
        "2024-03-04T00:00:00Z",
        json!({ "title": "Private draft", "visibility": "private" }),
    )
    .await;
    add_version(
        &store,
        Some("1"),
        "draft",
        "2024-03-02T00:00:00Z",
        json!({ "title": "Public draft", "visibility": "public" }),
    )
    .await;
    let doc = published("1");
    let access = AccessResult::Scoped(
        Predicate::from_value(&json!({
            "and": [{ "visibility": { "equals": "public" } }, { "id": { "equals": "1" } }]
        }))
        .unwrap(),
    );

    let resolved = resolve_draft(&store, &pages(), EntityKind::Collection, &doc, None, &access)
        .await
        .unwrap();
    assert_eq!(resolved.data["title"], "Public draft");

    let paths: Vec<String> = store
        .last_query()
        .filter
        .unwrap()
        .flatten()
        .iter()
        .map(|c| c.path.clone())
        .collect();
    assert!(paths.contains(&"version.visibility".to_string()));
    assert_eq!(paths.iter().filter(|p| p.as_str() == "parent").count(), 2);
}

#[tokio::test]
async fn test_near_in_access_predicate_uses_estimated_count() {
    let store = seeded_store().await;
    let doc = published("1");
    let access = AccessResult::Scoped(Predicate::leaf("location", Operator::Near, json!([10.0, 20.0, 5000])));

    resolve_draft(&store, &pages(), EntityKind::Collection, &doc, None, &access)
        .await
        .unwrap();

    assert!(store.last_options().use_estimated_count);
}

#[tokio::test]
async fn test_store_failure_propagates() {
    let doc = published("1");

    let err = resolve_draft(
        &UnavailableStore,
        &pages(),
        EntityKind::Collection,
        &doc,
        None,
        &AccessResult::Unrestricted,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, StoreError::Unavailable(_)));
}

#[test]
fn test_scope_to_version_maps_id_to_parent() {
    let access = Predicate::from_value(&json!({
        "or": [{ "id": { "in": ["1", "2"] } }, { "meta__author": { "equals": "me" } }]
    }))
    .unwrap();

    let scoped = scope_to_version(&access);
    let paths: Vec<&str> = scoped.flatten().iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["parent", "version.meta__author"]);
    assert!(matches!(scoped, Predicate::Or(_)));
}
