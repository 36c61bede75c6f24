//! Draft Resolution
//!
//! When drafts are enabled, saving a draft only writes a version document;
//! the published document stays as it was. Reading with `draft` set asks
//! whether a newer draft exists and, if the reader may see it, returns the
//! draft's content in place of the published content.
//!
//! A draft is eligible when it belongs to the document (collections only),
//! has `_status == "draft"` and was updated strictly after the published
//! document. The newest eligible draft wins; equally recent drafts resolve to
//! the latest inserted.

use crate::db::{sanitize_internal_fields, DocumentStore, FindOptions, SortKey, StoreError};
use crate::models::{
    timestamp_value, AccessResult, Document, EntityConfig, EntityKind, VersionDocument, VersionStatus, STATUS_FIELD,
};
use crate::query::{Operator, Predicate};

/// Rewrite an access predicate so it applies to version documents
///
/// Entity fields live under `version.` in the version collection and the
/// entity's own id is the version's `parent`.
pub fn scope_to_version(predicate: &Predicate) -> Predicate {
    predicate.map_paths(&|path: &str| {
        if path == "id" {
            "parent".to_string()
        } else {
            format!("version.{}", path)
        }
    })
}

/// Predicate selecting drafts newer than `doc`
fn newer_drafts(doc: &Document, kind: EntityKind, access: &AccessResult) -> Option<Predicate> {
    let updated_at = doc.updated_at?;

    let mut clauses = Vec::with_capacity(3);
    if kind == EntityKind::Collection {
        clauses.push(Predicate::leaf("parent", Operator::Equals, doc.id.clone()));
    }
    clauses.push(Predicate::leaf(
        format!("version.{}", STATUS_FIELD),
        Operator::Equals,
        VersionStatus::Draft.as_str(),
    ));
    clauses.push(Predicate::leaf(
        "updatedAt",
        Operator::GreaterThan,
        timestamp_value(updated_at),
    ));

    let predicate = Predicate::And(clauses);
    Some(match access.predicate() {
        Some(scoped) => predicate.and(scope_to_version(scoped)),
        None => predicate,
    })
}

/// Replace `doc` with its newest eligible draft, if any
///
/// Documents without both timestamps are returned unchanged, and so is every
/// document when the reader has no read access at all. Store errors are
/// returned as-is.
pub async fn resolve_draft(
    store: &dyn DocumentStore,
    entity: &EntityConfig,
    kind: EntityKind,
    doc: &Document,
    locale: Option<&str>,
    access: &AccessResult,
) -> Result<Document, StoreError> {
    if !doc.has_timestamps() || access.is_denied() {
        return Ok(doc.clone());
    }
    let Some(predicate) = newer_drafts(doc, kind, access) else {
        return Ok(doc.clone());
    };

    let options = FindOptions {
        lean: true,
        use_estimated_count: predicate.uses_near(),
        sort: vec![SortKey::desc("updatedAt")],
    };

    let query = store
        .build_query(&entity.versions_collection(), Some(&predicate), locale)
        .await?;

    let Some(found) = store.find_one(&query, &options).await? else {
        tracing::debug!("No newer draft for '{}' in '{}'", doc.id, entity.slug);
        return Ok(doc.clone());
    };

    let draft = VersionDocument::from_record(sanitize_internal_fields(found))?;
    tracing::debug!(
        "Draft '{}' supersedes '{}' in '{}'",
        draft.id,
        doc.id,
        entity.slug
    );

    Ok(overlay(doc, draft))
}

/// `{ id: doc.id, ...draft.version, createdAt, updatedAt }`
fn overlay(doc: &Document, draft: VersionDocument) -> Document {
    let mut data = draft.version;
    for envelope in ["id", "createdAt", "updatedAt"] {
        data.remove(envelope);
    }

    Document {
        id: doc.id.clone(),
        created_at: Some(draft.created_at),
        updated_at: Some(draft.updated_at),
        data,
    }
}

#[cfg(test)]
#[path = "drafts_test.rs"]
mod drafts_test;
