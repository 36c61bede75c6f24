//! In-Memory Document Store
//!
//! A [`DocumentStore`] keeping every collection in process memory. Used by the
//! dev server and by tests; predicates are evaluated by scanning records with
//! [`super::filter`].
//!
//! # Ordering
//!
//! Results follow the requested sort keys. Records that compare equal under
//! every key are returned latest-inserted first, so the newest of several
//! equally-recent drafts always wins. Geo-proximity queries without explicit
//! sort keys are ordered nearest first.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::error::StoreError;
use super::filter::{self, compare_values, haversine_distance, point_of, resolve_path};
use super::store::{
    sanitize_internal_fields, DocumentStore, FindOptions, PaginatedDocs, Pagination, SortDirection, SortKey,
    StoreQuery, REVISION_FIELD, SEQ_FIELD,
};
use crate::models::Record;
use crate::query::{Predicate, PATH_SEPARATOR};

#[derive(Debug, Default)]
struct Collection {
    records: Vec<Record>,
    localized_paths: Vec<String>,
}

/// Process-local document store
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    sequence: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection
    pub async fn count(&self, collection: &str) -> Result<usize, StoreError> {
        let collections = self.collections.read().await;
        collections
            .get(collection)
            .map(|c| c.records.len())
            .ok_or_else(|| StoreError::unknown_collection(collection))
    }

    fn next_seq(&self) -> u64 {
        self.sequence.fetch_add(1, AtomicOrdering::SeqCst)
    }
}

/// Redirect a dotted path under a localized field to one locale's value
fn localize_path(path: &str, localized_paths: &[String], locale: &str) -> String {
    for localized in localized_paths {
        if path == localized {
            return format!("{}.{}", path, locale);
        }
        if let Some(rest) = path
            .strip_prefix(localized.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
        {
            return format!("{}.{}.{}", localized, locale, rest);
        }
    }
    path.to_string()
}

fn seq_of(record: &Record) -> u64 {
    record.get(SEQ_FIELD).and_then(Value::as_u64).unwrap_or(0)
}

fn id_of(record: &Record) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Smallest distance from `origin` to any point stored at `path`
fn distance_at(record: &Record, path: &str, origin: (f64, f64)) -> f64 {
    resolve_path(record, path)
        .into_iter()
        .filter_map(point_of)
        .map(|point| haversine_distance(origin, point))
        .fold(f64::INFINITY, f64::min)
}

fn compare_records(
    a: &Record,
    b: &Record,
    sort: &[SortKey],
    proximity: Option<&(String, (f64, f64))>,
) -> Ordering {
    for key in sort {
        let left = resolve_path(a, &key.path).into_iter().next();
        let right = resolve_path(b, &key.path).into_iter().next();
        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(l), Some(r)) => compare_values(l, r).unwrap_or(Ordering::Equal),
        };
        let ordering = match key.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    if let Some((path, origin)) = proximity {
        let ordering = distance_at(a, path, *origin)
            .partial_cmp(&distance_at(b, path, *origin))
            .unwrap_or(Ordering::Equal);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    seq_of(b).cmp(&seq_of(a))
}

fn select<'a>(
    collection: &'a Collection,
    query: &StoreQuery,
    options: &FindOptions,
) -> Result<Vec<&'a Record>, StoreError> {
    let mut selected = Vec::new();
    for record in &collection.records {
        let keep = match &query.filter {
            Some(predicate) => filter::matches(record, predicate)?,
            None => true,
        };
        if keep {
            selected.push(record);
        }
    }

    let proximity = match (&query.filter, options.sort.is_empty()) {
        (Some(predicate), true) => filter::near_origin(predicate),
        _ => None,
    };
    selected.sort_by(|a, b| compare_records(a, b, &options.sort, proximity.as_ref()));

    Ok(selected)
}

fn present(record: &Record, lean: bool) -> Record {
    if lean {
        record.clone()
    } else {
        sanitize_internal_fields(record.clone())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn register_collection(&self, collection: &str, localized_paths: Vec<String>) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        entry.localized_paths = localized_paths;
        tracing::debug!(
            "Registered collection '{}' with {} localized paths",
            collection,
            entry.localized_paths.len()
        );
        Ok(())
    }

    async fn build_query(
        &self,
        collection: &str,
        predicate: Option<&Predicate>,
        locale: Option<&str>,
    ) -> Result<StoreQuery, StoreError> {
        let collections = self.collections.read().await;
        let registered = collections
            .get(collection)
            .ok_or_else(|| StoreError::unknown_collection(collection))?;

        let filter = predicate.map(|predicate| {
            predicate.map_paths(&|path: &str| {
                let dotted = path.replace(PATH_SEPARATOR, ".");
                match locale {
                    Some(locale) if locale != "all" => localize_path(&dotted, &registered.localized_paths, locale),
                    _ => dotted,
                }
            })
        });

        Ok(StoreQuery {
            collection: collection.to_string(),
            filter,
            locale: locale.map(str::to_string),
        })
    }

    async fn find_one(&self, query: &StoreQuery, options: &FindOptions) -> Result<Option<Record>, StoreError> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(&query.collection)
            .ok_or_else(|| StoreError::unknown_collection(&query.collection))?;

        let selected = select(collection, query, options)?;
        Ok(selected.first().map(|record| present(record, options.lean)))
    }

    async fn find(
        &self,
        query: &StoreQuery,
        options: &FindOptions,
        pagination: Option<Pagination>,
    ) -> Result<PaginatedDocs<Record>, StoreError> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(&query.collection)
            .ok_or_else(|| StoreError::unknown_collection(&query.collection))?;

        let selected = select(collection, query, options)?;
        let total_docs = if options.use_estimated_count {
            collection.records.len()
        } else {
            selected.len()
        };

        let page: Vec<Record> = match pagination {
            Some(p) => selected
                .iter()
                .skip(p.offset())
                .take(p.limit)
                .map(|record| present(record, options.lean))
                .collect(),
            None => selected.iter().map(|record| present(record, options.lean)).collect(),
        };

        Ok(PaginatedDocs::new(page, total_docs, pagination))
    }

    async fn insert(&self, collection: &str, mut record: Record) -> Result<Record, StoreError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::unknown_collection(collection))?;

        let id = match id_of(&record) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };
        if target.records.iter().any(|existing| id_of(existing) == Some(id.as_str())) {
            return Err(StoreError::duplicate_id(collection, id));
        }

        record.insert("id".to_string(), Value::String(id));
        record.insert(SEQ_FIELD.to_string(), json!(self.next_seq()));
        record.insert(REVISION_FIELD.to_string(), json!(0));

        let stored = sanitize_internal_fields(record.clone());
        target.records.push(record);
        Ok(stored)
    }

    async fn update(&self, collection: &str, id: &str, mut record: Record) -> Result<Record, StoreError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::unknown_collection(collection))?;

        let existing = target
            .records
            .iter_mut()
            .find(|existing| id_of(existing) == Some(id))
            .ok_or_else(|| StoreError::document_not_found(collection, id))?;

        let revision = existing.get(REVISION_FIELD).and_then(Value::as_u64).unwrap_or(0) + 1;
        record.insert("id".to_string(), Value::String(id.to_string()));
        record.insert(SEQ_FIELD.to_string(), json!(seq_of(existing)));
        record.insert(REVISION_FIELD.to_string(), json!(revision));

        *existing = record;
        Ok(sanitize_internal_fields(existing.clone()))
    }

    async fn delete_many(&self, query: &StoreQuery) -> Result<usize, StoreError> {
        let mut collections = self.collections.write().await;
        let target = collections
            .get_mut(&query.collection)
            .ok_or_else(|| StoreError::unknown_collection(&query.collection))?;

        let mut doomed = Vec::with_capacity(target.records.len());
        for record in &target.records {
            doomed.push(match &query.filter {
                Some(predicate) => filter::matches(record, predicate)?,
                None => true,
            });
        }

        let before = target.records.len();
        let mut flags = doomed.into_iter();
        target.records.retain(|_| !flags.next().unwrap_or(false));
        Ok(before - target.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Operator;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {}", other),
        }
    }

    async fn store_with(collection: &str, localized: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .register_collection(collection, localized.iter().map(|p| p.to_string()).collect())
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_insert_assigns_id_and_hides_bookkeeping() {
        let store = store_with("posts", &[]).await;
        let stored = store.insert("posts", record(json!({ "title": "x" }))).await.unwrap();

        assert!(stored.get("id").and_then(Value::as_str).is_some());
        assert!(!stored.contains_key(SEQ_FIELD));

        let query = store.build_query("posts", None, None).await.unwrap();
        let lean = store
            .find_one(&query, &FindOptions { lean: true, ..Default::default() })
            .await
            .unwrap()
            .unwrap();
        assert!(lean.contains_key(SEQ_FIELD));
        assert!(lean.contains_key(REVISION_FIELD));
    }

    #[tokio::test]
    async fn test_unregistered_collection_is_an_error() {
        let store = MemoryStore::new();
        let err = store.insert("ghosts", Record::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownCollection(_)));
        assert!(store.build_query("ghosts", None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_id_rejected() {
        let store = store_with("posts", &[]).await;
        store.insert("posts", record(json!({ "id": "1" }))).await.unwrap();
        let err = store.insert("posts", record(json!({ "id": "1" }))).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId { .. }));
    }

    #[tokio::test]
    async fn test_build_query_rewrites_paths() {
        let store = store_with("_pages_versions", &["version.title", "version.meta"]).await;
        let predicate = Predicate::And(vec![
            Predicate::leaf("version__title", Operator::Equals, "Hallo"),
            Predicate::leaf("version__meta__description", Operator::Like, "x"),
            Predicate::leaf("version__slug", Operator::Equals, "home"),
        ]);

        let query = store
            .build_query("_pages_versions", Some(&predicate), Some("de"))
            .await
            .unwrap();
        let paths: Vec<&str> = query
            .filter
            .as_ref()
            .unwrap()
            .flatten()
            .iter()
            .map(|c| c.path.as_str())
            .collect();
        assert_eq!(
            paths,
            vec!["version.title.de", "version.meta.de.description", "version.slug"]
        );

        let all = store
            .build_query("_pages_versions", Some(&predicate), Some("all"))
            .await
            .unwrap();
        assert_eq!(all.filter.unwrap().flatten()[0].path, "version.title");
    }

    #[tokio::test]
    async fn test_ties_resolve_to_latest_inserted() {
        let store = store_with("versions", &[]).await;
        for label in ["first", "second", "third"] {
            store
                .insert(
                    "versions",
                    record(json!({ "label": label, "updatedAt": "2024-01-01T00:00:00Z" })),
                )
                .await
                .unwrap();
        }

        let query = store.build_query("versions", None, None).await.unwrap();
        let found = store
            .find_one(&query, &FindOptions::sorted_by(vec![SortKey::desc("updatedAt")]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["label"], "third");
    }

    #[tokio::test]
    async fn test_find_sorts_and_paginates() {
        let store = store_with("posts", &[]).await;
        for n in [3, 1, 2, 5, 4] {
            store.insert("posts", record(json!({ "n": n }))).await.unwrap();
        }

        let query = store.build_query("posts", None, None).await.unwrap();
        let page = store
            .find(
                &query,
                &FindOptions::sorted_by(vec![SortKey::asc("n")]),
                Some(Pagination::new(2, 2)),
            )
            .await
            .unwrap();

        let values: Vec<i64> = page.docs.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(values, vec![3, 4]);
        assert_eq!(page.total_docs, 5);
        assert_eq!(page.total_pages, 3);
    }

    #[tokio::test]
    async fn test_near_orders_by_distance_and_estimates_count() {
        let store = store_with("geolocation", &[]).await;
        store.insert("geolocation", record(json!({ "name": "far", "location": [10.05, 20.0] }))).await.unwrap();
        store.insert("geolocation", record(json!({ "name": "near", "location": [10.001, 20.0] }))).await.unwrap();
        store.insert("geolocation", record(json!({ "name": "away", "location": [50.0, 50.0] }))).await.unwrap();

        let predicate = Predicate::leaf("location", Operator::Near, json!([10.0, 20.0, 10000]));
        let query = store.build_query("geolocation", Some(&predicate), None).await.unwrap();

        let exact = store.find(&query, &FindOptions::default(), None).await.unwrap();
        let names: Vec<&str> = exact.docs.iter().map(|d| d["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["near", "far"]);
        assert_eq!(exact.total_docs, 2);

        let estimated = store
            .find(
                &query,
                &FindOptions {
                    use_estimated_count: true,
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(estimated.total_docs, 3);
    }

    #[tokio::test]
    async fn test_update_and_delete_many() {
        let store = store_with("posts", &[]).await;
        let stored = store.insert("posts", record(json!({ "title": "old" }))).await.unwrap();
        let id = stored["id"].as_str().unwrap().to_string();

        let updated = store
            .update("posts", &id, record(json!({ "title": "new" })))
            .await
            .unwrap();
        assert_eq!(updated["title"], "new");
        assert_eq!(updated["id"], id.as_str());

        let missing = store.update("posts", "nope", Record::new()).await.unwrap_err();
        assert!(matches!(missing, StoreError::DocumentNotFound { .. }));

        let predicate = Predicate::leaf("title", Operator::Equals, "new");
        let query = store.build_query("posts", Some(&predicate), None).await.unwrap();
        assert_eq!(store.delete_many(&query).await.unwrap(), 1);
        assert_eq!(store.count("posts").await.unwrap(), 0);
    }
}
