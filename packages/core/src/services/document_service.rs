//! Document Service
//!
//! Read and write operations over the entities of an [`EntityRegistry`]:
//!
//! - `find` / `find_by_id` for collections, `find_global` for globals, all
//!   access-scoped, with optional draft overlay and locale selection
//! - `create` / `update` / `save_global`, writing a version document on
//!   every change of a versioned entity
//! - `find_versions` / `find_global_versions` over version history
//!
//! Globals share one store collection ([`GLOBALS_COLLECTION`]) and are told
//! apart by their [`GLOBAL_TYPE_FIELD`].
//!
//! # Drafts
//!
//! A draft save of an existing document writes only a version document. The
//! stored document keeps its published content until the next published
//! save; readers asking for `draft` get the newest draft overlaid.

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::error::ContentServiceError;
use super::localization::{localize_record, merge_localized, ALL_LOCALES};
use super::registry::{CompiledEntity, EntityRegistry};
use crate::config::{ContentConfig, LocalizationConfig, PaginationConfig};
use crate::db::{DocumentStore, FindOptions, PaginatedDocs, Pagination, SortKey};
use crate::models::{AccessResult, Document, Record, VersionDocument, VersionStatus, STATUS_FIELD};
use crate::query::{Operator, Predicate, WhereSchema};
use crate::versions::{find_versions, resolve_draft, save_version, VersionQuery};

/// Store collection holding every global
pub const GLOBALS_COLLECTION: &str = "globals";

/// Names the global a record of [`GLOBALS_COLLECTION`] belongs to
pub const GLOBAL_TYPE_FIELD: &str = "globalType";

/// `fallbackLocale` value disabling the fallback
const NO_FALLBACK: &str = "none";

/// Parameters of a paginated read
#[derive(Debug, Clone, Default)]
pub struct FindParams {
    /// `where` argument in its JSON form
    pub where_clause: Option<Value>,
    pub sort: Vec<SortKey>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
    /// Overlay newer drafts (ignored for version queries)
    pub draft: bool,
    pub locale: Option<String>,
    pub fallback_locale: Option<String>,
}

/// Parameters of a single-document read
#[derive(Debug, Clone, Default)]
pub struct ReadParams {
    pub draft: bool,
    pub locale: Option<String>,
    pub fallback_locale: Option<String>,
}

/// Parameters of a write
#[derive(Debug, Clone, Default)]
pub struct SaveParams {
    /// Save as draft (only honored when the entity has drafts enabled)
    pub draft: bool,
    pub locale: Option<String>,
}

/// Locale a request reads in
#[derive(Debug, Clone, PartialEq, Eq)]
struct LocaleSelection {
    locale: String,
    fallback: Option<String>,
}

impl LocaleSelection {
    fn locale(selection: Option<&LocaleSelection>) -> Option<&str> {
        selection.map(|s| s.locale.as_str())
    }
}

/// Parse a JSON `where` argument and check it against `schema`
fn parse_where(schema: &WhereSchema, raw: Option<&Value>) -> Result<Option<Predicate>, ContentServiceError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let predicate = Predicate::from_value(raw)?;
    schema.validate(&predicate)?;
    Ok(Some(predicate))
}

/// Resolve the read rule, rejecting denied readers
fn read_access(entity: &CompiledEntity) -> Result<AccessResult, ContentServiceError> {
    let access = entity.read_access()?;
    if access.is_denied() {
        tracing::debug!("Read of '{}' denied", entity.slug());
        return Err(ContentServiceError::forbidden(entity.slug()));
    }
    Ok(access)
}

/// Conjoin an optional filter with the reader's access scope
fn scoped(filter: Option<Predicate>, access: &AccessResult) -> Option<Predicate> {
    let mut clauses: Vec<Predicate> = filter.into_iter().collect();
    if let Some(scope) = access.predicate() {
        clauses.push(scope.clone());
    }
    Predicate::all(clauses)
}

/// Envelope keys are owned by the service, never by the caller
fn strip_envelope(mut data: Record) -> Record {
    for key in ["id", "createdAt", "updatedAt"] {
        data.remove(key);
    }
    data
}

/// Content service over one document store
pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    registry: Arc<EntityRegistry>,
    localization: Option<LocalizationConfig>,
    pagination: PaginationConfig,
    /// Last timestamp handed out; saves get strictly increasing times
    clock: Mutex<Option<DateTime<Utc>>>,
}

impl DocumentService {
    /// Create the service and register every collection it writes to
    pub async fn new(
        store: Arc<dyn DocumentStore>,
        registry: Arc<EntityRegistry>,
        config: &ContentConfig,
    ) -> Result<Self, ContentServiceError> {
        let service = Self {
            store,
            registry,
            localization: config.localization.clone(),
            pagination: config.pagination,
            clock: Mutex::new(None),
        };
        service.register_collections().await?;
        Ok(service)
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    async fn register_collections(&self) -> Result<(), ContentServiceError> {
        for entity in self.registry.collections() {
            self.store
                .register_collection(entity.slug(), entity.localized_paths.clone())
                .await?;
        }

        let mut global_paths: Vec<String> = Vec::new();
        for entity in self.registry.globals() {
            for path in &entity.localized_paths {
                if !global_paths.contains(path) {
                    global_paths.push(path.clone());
                }
            }
        }
        self.store.register_collection(GLOBALS_COLLECTION, global_paths).await?;

        for entity in self.registry.collections().chain(self.registry.globals()) {
            if entity.config.is_versioned() {
                self.store
                    .register_collection(&entity.config.versions_collection(), entity.version_localized_paths())
                    .await?;
            }
        }
        Ok(())
    }

    /// Compiled where-schema of a collection
    pub fn where_schema(&self, slug: &str) -> Result<&WhereSchema, ContentServiceError> {
        Ok(&self.registry.collection(slug)?.where_schema)
    }

    /// Strictly increasing save time
    async fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = self.clock.lock().await;
        let now = Utc::now();
        let next = match *last {
            Some(previous) if now <= previous => previous + Duration::milliseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }

    /// Locale and fallback for a read, `None` without localization
    fn select_locale(
        &self,
        requested: Option<&str>,
        fallback: Option<&str>,
    ) -> Result<Option<LocaleSelection>, ContentServiceError> {
        let Some(config) = &self.localization else {
            return Ok(None);
        };

        let locale = requested.unwrap_or(&config.default_locale);
        if locale != ALL_LOCALES && !config.has_locale(locale) {
            return Err(ContentServiceError::invalid_input(format!("Unknown locale '{}'", locale)));
        }

        let fallback = match fallback {
            Some(NO_FALLBACK) => None,
            Some(other) if config.has_locale(other) => Some(other.to_string()),
            Some(other) => {
                return Err(ContentServiceError::invalid_input(format!(
                    "Unknown fallback locale '{}'",
                    other
                )))
            }
            None if config.fallback => Some(config.default_locale.clone()),
            None => None,
        };

        Ok(Some(LocaleSelection {
            locale: locale.to_string(),
            fallback,
        }))
    }

    fn localize(&self, paths: &[String], data: &mut Record, selection: Option<&LocaleSelection>) {
        if let (Some(config), Some(selection)) = (&self.localization, selection) {
            localize_record(
                data,
                paths,
                &config.locales,
                &selection.locale,
                selection.fallback.as_deref(),
            );
        }
    }

    /// Draft overlay followed by localization
    async fn present(
        &self,
        entity: &CompiledEntity,
        doc: Document,
        draft: bool,
        selection: Option<&LocaleSelection>,
        access: &AccessResult,
    ) -> Result<Document, ContentServiceError> {
        let mut doc = if draft && entity.config.drafts_enabled() {
            resolve_draft(
                self.store.as_ref(),
                &entity.config,
                entity.kind,
                &doc,
                LocaleSelection::locale(selection),
                access,
            )
            .await?
        } else {
            doc
        };
        self.localize(&entity.localized_paths, &mut doc.data, selection);
        Ok(doc)
    }

    fn find_options(&self, entity: &CompiledEntity, predicate: Option<&Predicate>, sort: Vec<SortKey>) -> FindOptions {
        let uses_near = predicate.map(Predicate::uses_near).unwrap_or(false);
        // Proximity order applies only when no explicit sort is given
        let sort = if !sort.is_empty() || uses_near {
            sort
        } else if entity.config.timestamps {
            vec![SortKey::desc("createdAt")]
        } else {
            Vec::new()
        };
        FindOptions {
            lean: false,
            use_estimated_count: uses_near,
            sort,
        }
    }

    fn pagination_for(&self, page: Option<usize>, limit: Option<usize>) -> Pagination {
        Pagination::new(page.unwrap_or(1), self.pagination.clamp(limit))
    }

    /// Load one stored document with every locale intact
    async fn load(&self, collection: &str, predicate: Predicate) -> Result<Option<Document>, ContentServiceError> {
        let query = self.store.build_query(collection, Some(&predicate), None).await?;
        let found = self.store.find_one(&query, &FindOptions::default()).await?;
        Ok(found.map(Document::from_record).transpose()?)
    }

    /// Paginated, access-scoped read of a collection
    pub async fn find(&self, slug: &str, params: FindParams) -> Result<PaginatedDocs<Document>, ContentServiceError> {
        let entity = self.registry.collection(slug)?;
        let access = read_access(entity)?;
        let selection = self.select_locale(params.locale.as_deref(), params.fallback_locale.as_deref())?;

        let filter = parse_where(&entity.where_schema, params.where_clause.as_ref())?;
        let predicate = scoped(filter, &access);
        let options = self.find_options(entity, predicate.as_ref(), params.sort);
        let pagination = self.pagination_for(params.page, params.limit);

        let query = self
            .store
            .build_query(slug, predicate.as_ref(), LocaleSelection::locale(selection.as_ref()))
            .await?;
        let page = self.store.find(&query, &options, Some(pagination)).await?;

        let mut docs = Vec::with_capacity(page.docs.len());
        for record in &page.docs {
            let doc = Document::from_record(record.clone())?;
            docs.push(
                self.present(entity, doc, params.draft, selection.as_ref(), &access)
                    .await?,
            );
        }

        tracing::debug!(
            "find '{}' returned {} of {} documents",
            slug,
            docs.len(),
            page.total_docs
        );
        Ok(page.with_docs(docs))
    }

    /// Read one document of a collection
    ///
    /// Documents outside the reader's access scope are reported as not found.
    pub async fn find_by_id(&self, slug: &str, id: &str, params: ReadParams) -> Result<Document, ContentServiceError> {
        let entity = self.registry.collection(slug)?;
        let access = read_access(entity)?;
        let selection = self.select_locale(params.locale.as_deref(), params.fallback_locale.as_deref())?;

        let predicate = scoped(Some(Predicate::leaf("id", Operator::Equals, id)), &access);
        let query = self
            .store
            .build_query(slug, predicate.as_ref(), LocaleSelection::locale(selection.as_ref()))
            .await?;
        let record = self
            .store
            .find_one(&query, &FindOptions::default())
            .await?
            .ok_or_else(|| ContentServiceError::document_not_found(slug, id))?;

        let doc = Document::from_record(record)?;
        self.present(entity, doc, params.draft, selection.as_ref(), &access)
            .await
    }

    /// Create a collection document
    pub async fn create(&self, slug: &str, data: Record, params: SaveParams) -> Result<Document, ContentServiceError> {
        let entity = self.registry.collection(slug)?;
        self.save(entity, slug, None, data, &params).await
    }

    /// Apply `patch` to an existing collection document
    ///
    /// Top-level fields of the patch replace the stored ones. A draft update
    /// starts from the newest draft rather than the published content.
    pub async fn update(
        &self,
        slug: &str,
        id: &str,
        patch: Record,
        params: SaveParams,
    ) -> Result<Document, ContentServiceError> {
        let entity = self.registry.collection(slug)?;
        let existing = self
            .load(slug, Predicate::leaf("id", Operator::Equals, id))
            .await?
            .ok_or_else(|| ContentServiceError::document_not_found(slug, id))?;
        self.save(entity, slug, Some(existing), patch, &params).await
    }

    /// Read a global; a global never saved reads as `{ globalType }`
    pub async fn find_global(&self, slug: &str, params: ReadParams) -> Result<Record, ContentServiceError> {
        let entity = self.registry.global(slug)?;
        let access = read_access(entity)?;
        let selection = self.select_locale(params.locale.as_deref(), params.fallback_locale.as_deref())?;

        let predicate = scoped(Some(Predicate::leaf(GLOBAL_TYPE_FIELD, Operator::Equals, slug)), &access);
        let query = self
            .store
            .build_query(
                GLOBALS_COLLECTION,
                predicate.as_ref(),
                LocaleSelection::locale(selection.as_ref()),
            )
            .await?;

        let Some(record) = self.store.find_one(&query, &FindOptions::default()).await? else {
            let mut empty = Record::new();
            empty.insert(GLOBAL_TYPE_FIELD.to_string(), json!(slug));
            return Ok(empty);
        };

        let doc = Document::from_record(record)?;
        let doc = self
            .present(entity, doc, params.draft, selection.as_ref(), &access)
            .await?;
        Ok(doc.into_record()?)
    }

    /// Create or update a global
    pub async fn save_global(&self, slug: &str, data: Record, params: SaveParams) -> Result<Record, ContentServiceError> {
        let entity = self.registry.global(slug)?;
        let existing = self
            .load(
                GLOBALS_COLLECTION,
                Predicate::leaf(GLOBAL_TYPE_FIELD, Operator::Equals, slug),
            )
            .await?;

        let mut data = data;
        data.insert(GLOBAL_TYPE_FIELD.to_string(), json!(slug));
        let saved = self
            .save(entity, GLOBALS_COLLECTION, existing, data, &params)
            .await?;
        Ok(saved.into_record()?)
    }

    /// Write one change and its version document
    async fn save(
        &self,
        entity: &CompiledEntity,
        collection: &str,
        existing: Option<Document>,
        patch: Record,
        params: &SaveParams,
    ) -> Result<Document, ContentServiceError> {
        let selection = self.select_locale(params.locale.as_deref(), None)?;
        if LocaleSelection::locale(selection.as_ref()) == Some(ALL_LOCALES) {
            return Err(ContentServiceError::invalid_input(
                "Documents cannot be written in every locale at once",
            ));
        }

        let draft = params.draft && entity.config.drafts_enabled();
        let status = if draft {
            VersionStatus::Draft
        } else {
            VersionStatus::Published
        };
        let at = self.next_timestamp().await;

        let base = match &existing {
            Some(doc) if draft => Some(
                resolve_draft(
                    self.store.as_ref(),
                    &entity.config,
                    entity.kind,
                    doc,
                    None,
                    &AccessResult::Unrestricted,
                )
                .await?,
            ),
            other => other.clone(),
        };

        let mut data = base.map(|doc| doc.data).unwrap_or_default();
        let incoming = match (&self.localization, LocaleSelection::locale(selection.as_ref())) {
            (Some(config), Some(locale)) => merge_localized(
                Some(&data),
                strip_envelope(patch),
                &entity.localized_paths,
                &config.locales,
                locale,
            ),
            _ => strip_envelope(patch),
        };
        data.extend(incoming);
        if entity.config.drafts_enabled() {
            data.insert(STATUS_FIELD.to_string(), json!(status.as_str()));
        }

        let (created_at, updated_at) = if entity.config.timestamps {
            let created_at = existing.as_ref().and_then(|doc| doc.created_at).unwrap_or(at);
            (Some(created_at), Some(at))
        } else {
            (None, None)
        };

        let mut saved = match existing {
            Some(doc) if draft => Document {
                id: doc.id,
                created_at,
                updated_at,
                data,
            },
            Some(doc) => {
                let record = Document {
                    id: doc.id.clone(),
                    created_at,
                    updated_at,
                    data,
                }
                .into_record()?;
                Document::from_record(self.store.update(collection, &doc.id, record).await?)?
            }
            None => {
                let mut record = Document {
                    id: String::new(),
                    created_at,
                    updated_at,
                    data,
                }
                .into_record()?;
                record.remove("id");
                Document::from_record(self.store.insert(collection, record).await?)?
            }
        };

        if entity.config.is_versioned() {
            save_version(
                self.store.as_ref(),
                &entity.config,
                entity.kind,
                Some(&saved.id),
                saved.clone().into_record()?,
                status,
                at,
            )
            .await?;
        }

        tracing::info!(
            "Saved {} '{}' in '{}'",
            status.as_str(),
            saved.id,
            entity.slug()
        );

        self.localize(&entity.localized_paths, &mut saved.data, selection.as_ref());
        Ok(saved)
    }

    /// Version history of a collection
    pub async fn find_versions(
        &self,
        slug: &str,
        params: FindParams,
    ) -> Result<PaginatedDocs<VersionDocument>, ContentServiceError> {
        let entity = self.registry.collection(slug)?;
        self.versions_of(entity, params).await
    }

    /// Version history of a global
    pub async fn find_global_versions(
        &self,
        slug: &str,
        params: FindParams,
    ) -> Result<PaginatedDocs<VersionDocument>, ContentServiceError> {
        let entity = self.registry.global(slug)?;
        self.versions_of(entity, params).await
    }

    async fn versions_of(
        &self,
        entity: &CompiledEntity,
        params: FindParams,
    ) -> Result<PaginatedDocs<VersionDocument>, ContentServiceError> {
        let schema = entity
            .version_where_schema
            .as_ref()
            .ok_or_else(|| ContentServiceError::not_versioned(entity.slug()))?;
        let access = read_access(entity)?;
        let selection = self.select_locale(params.locale.as_deref(), params.fallback_locale.as_deref())?;

        let query = VersionQuery {
            where_clause: parse_where(schema, params.where_clause.as_ref())?,
            sort: params.sort,
            pagination: Some(self.pagination_for(params.page, params.limit)),
            locale: selection.as_ref().map(|s| s.locale.clone()),
        };

        let mut page = find_versions(self.store.as_ref(), &entity.config, &access, query).await?;
        for version in &mut page.docs {
            self.localize(&entity.localized_paths, &mut version.version, selection.as_ref());
        }
        Ok(page)
    }
}

#[cfg(test)]
#[path = "document_service_test.rs"]
mod document_service_test;
