//! Version History
//!
//! Every change to a versioned entity writes a new version document holding
//! a full snapshot of the data. Version documents are never updated; the
//! oldest ones are pruned once an entity exceeds `versions.maxPerDoc`.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::drafts::scope_to_version;
use crate::db::{DocumentStore, FindOptions, PaginatedDocs, Pagination, SortKey, StoreError};
use crate::models::{
    timestamp_value, AccessResult, EntityConfig, EntityKind, Record, VersionDocument, VersionStatus, STATUS_FIELD,
};
use crate::query::{Operator, Predicate};

/// Restricts version queries to one entity's history
fn owner_clause(kind: EntityKind, parent: Option<&str>) -> Option<Predicate> {
    match (kind, parent) {
        (EntityKind::Collection, Some(parent)) => Some(Predicate::leaf("parent", Operator::Equals, parent)),
        _ => None,
    }
}

/// Write a version snapshot of `data`
///
/// `data` is the full document as it reads after the change; its `id` is
/// dropped from the snapshot and `_status` is set to `status`.
pub async fn save_version(
    store: &dyn DocumentStore,
    entity: &EntityConfig,
    kind: EntityKind,
    parent: Option<&str>,
    mut data: Record,
    status: VersionStatus,
    at: DateTime<Utc>,
) -> Result<VersionDocument, StoreError> {
    data.remove("id");
    data.insert(STATUS_FIELD.to_string(), json!(status.as_str()));

    let mut record = Record::new();
    if kind == EntityKind::Collection {
        if let Some(parent) = parent {
            record.insert("parent".to_string(), Value::String(parent.to_string()));
        }
    }
    record.insert("version".to_string(), Value::Object(data));
    record.insert("createdAt".to_string(), timestamp_value(at));
    record.insert("updatedAt".to_string(), timestamp_value(at));

    let stored = store.insert(&entity.versions_collection(), record).await?;
    let version = VersionDocument::from_record(stored)?;
    tracing::debug!(
        "Saved {} version '{}' of '{}'",
        status.as_str(),
        version.id,
        entity.slug
    );

    if let Some(config) = &entity.versions {
        if config.max_per_doc > 0 {
            enforce_max_per_doc(store, entity, kind, parent, config.max_per_doc).await?;
        }
    }

    Ok(version)
}

/// Delete all but the `max` newest versions of one document
///
/// Returns the number of versions removed.
pub async fn enforce_max_per_doc(
    store: &dyn DocumentStore,
    entity: &EntityConfig,
    kind: EntityKind,
    parent: Option<&str>,
    max: usize,
) -> Result<usize, StoreError> {
    let collection = entity.versions_collection();
    let owner = owner_clause(kind, parent);

    let query = store.build_query(&collection, owner.as_ref(), None).await?;
    let history = store
        .find(&query, &FindOptions::sorted_by(vec![SortKey::desc("updatedAt")]), None)
        .await?;

    let expired: Vec<Value> = history
        .docs
        .iter()
        .skip(max)
        .filter_map(|record| record.get("id").cloned())
        .collect();
    if expired.is_empty() {
        return Ok(0);
    }

    let doomed = Predicate::leaf("id", Operator::In, Value::Array(expired));
    let query = store.build_query(&collection, Some(&doomed), None).await?;
    let removed = store.delete_many(&query).await?;
    tracing::debug!("Pruned {} versions of '{}'", removed, entity.slug);
    Ok(removed)
}

/// Parameters of a version history query
#[derive(Debug, Clone, Default)]
pub struct VersionQuery {
    /// `where` over version paths (`version.title`, `parent`, `updatedAt`)
    pub where_clause: Option<Predicate>,
    pub sort: Vec<SortKey>,
    pub pagination: Option<Pagination>,
    pub locale: Option<String>,
}

/// Page through an entity's versions, newest first unless sorted otherwise
///
/// A scoped access result is applied to the snapshot fields the same way it
/// is for draft resolution.
pub async fn find_versions(
    store: &dyn DocumentStore,
    entity: &EntityConfig,
    access: &AccessResult,
    params: VersionQuery,
) -> Result<PaginatedDocs<VersionDocument>, StoreError> {
    let mut clauses = Vec::new();
    if let Some(where_clause) = params.where_clause {
        clauses.push(where_clause);
    }
    if let Some(scoped) = access.predicate() {
        clauses.push(scope_to_version(scoped));
    }
    let predicate = Predicate::all(clauses);

    let options = FindOptions {
        lean: false,
        use_estimated_count: predicate.as_ref().map(Predicate::uses_near).unwrap_or(false),
        sort: if params.sort.is_empty() {
            vec![SortKey::desc("updatedAt")]
        } else {
            params.sort
        },
    };

    let query = store
        .build_query(&entity.versions_collection(), predicate.as_ref(), params.locale.as_deref())
        .await?;
    let page = store.find(&query, &options, params.pagination).await?;

    let versions = page
        .docs
        .iter()
        .cloned()
        .map(VersionDocument::from_record)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(page.with_docs(versions))
}
