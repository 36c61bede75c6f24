//! DocumentStore Trait - Persistence Abstraction
//!
//! Services talk to persistence only through [`DocumentStore`]. A store keeps
//! named collections of JSON records and answers predicate queries with sort
//! and pagination.
//!
//! # Query Flow
//!
//! 1. [`DocumentStore::build_query`] turns a `where` predicate into a
//!    store-native [`StoreQuery`]. Query paths (`points__location`) become
//!    dotted data paths and localized fields are redirected to the requested
//!    locale.
//! 2. [`DocumentStore::find_one`] / [`DocumentStore::find`] execute it.
//!
//! # Internal Fields
//!
//! Records carry bookkeeping keys (`_seq`, `__v`) that never leave the
//! service layer. Use [`sanitize_internal_fields`] before handing a lean
//! record to callers.

use async_trait::async_trait;
use serde::Serialize;

use super::error::StoreError;
use crate::models::Record;
use crate::query::{Predicate, PATH_SEPARATOR};

/// Store-maintained insertion sequence, used to order ties
pub const SEQ_FIELD: &str = "_seq";

/// Store-maintained revision counter
pub const REVISION_FIELD: &str = "__v";

const INTERNAL_FIELDS: &[&str] = &[SEQ_FIELD, REVISION_FIELD];

/// Drop store bookkeeping keys from a record
pub fn sanitize_internal_fields(mut record: Record) -> Record {
    for field in INTERNAL_FIELDS {
        record.remove(*field);
    }
    record
}

/// Sort direction of one sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// A single sort key over a dotted data path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub path: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Parse `field` / `-field`, accepting `__` query paths
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().replace(PATH_SEPARATOR, ".");
        let raw = raw.as_str();
        match raw.strip_prefix('-') {
            Some("") => None,
            Some(path) => Some(Self::desc(path)),
            None if raw.is_empty() => None,
            None => Some(Self::asc(raw)),
        }
    }

    /// Parse a comma-separated sort list such as `-updatedAt,title`
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split(',').filter_map(Self::parse).collect()
    }
}

/// Options for `find_one` / `find`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Return raw records (bookkeeping included) instead of sanitized ones
    pub lean: bool,
    /// Report an estimated total instead of counting matches
    ///
    /// Required by geo-proximity queries, which cannot be counted exactly.
    pub use_estimated_count: bool,
    pub sort: Vec<SortKey>,
}

impl FindOptions {
    pub fn sorted_by(sort: Vec<SortKey>) -> Self {
        Self {
            sort,
            ..Self::default()
        }
    }
}

/// Page request, 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
}

impl Pagination {
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedDocs<T> {
    pub docs: Vec<T>,
    pub total_docs: usize,
    pub limit: usize,
    pub total_pages: usize,
    pub page: usize,
    pub paging_counter: usize,
    pub has_prev_page: bool,
    pub has_next_page: bool,
    pub prev_page: Option<usize>,
    pub next_page: Option<usize>,
}

impl<T> PaginatedDocs<T> {
    /// Wrap a page of documents; without pagination everything is one page
    pub fn new(docs: Vec<T>, total_docs: usize, pagination: Option<Pagination>) -> Self {
        let (page, limit) = match pagination {
            Some(p) => (p.page, p.limit),
            None => (1, total_docs.max(docs.len()).max(1)),
        };
        let total_pages = total_docs.div_ceil(limit).max(1);
        let has_prev_page = page > 1;
        let has_next_page = page < total_pages;

        Self {
            docs,
            total_docs,
            limit,
            total_pages,
            page,
            paging_counter: (page - 1).saturating_mul(limit).saturating_add(1),
            has_prev_page,
            has_next_page,
            prev_page: has_prev_page.then(|| page - 1),
            next_page: has_next_page.then(|| page + 1),
        }
    }

    /// Same page metadata around a different set of documents
    pub fn with_docs<U>(self, docs: Vec<U>) -> PaginatedDocs<U> {
        PaginatedDocs {
            docs,
            total_docs: self.total_docs,
            limit: self.limit,
            total_pages: self.total_pages,
            page: self.page,
            paging_counter: self.paging_counter,
            has_prev_page: self.has_prev_page,
            has_next_page: self.has_next_page,
            prev_page: self.prev_page,
            next_page: self.next_page,
        }
    }
}

/// Store-native query produced by [`DocumentStore::build_query`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoreQuery {
    pub collection: String,
    /// Filter over dotted data paths; `None` matches every record
    pub filter: Option<Predicate>,
    pub locale: Option<String>,
}

/// Abstraction over document persistence
///
/// Implementations must be `Send + Sync`; services share one store behind
/// an `Arc` across request tasks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Declare a collection and the dotted paths of its localized fields
    ///
    /// Registering an existing collection replaces its localized paths and
    /// keeps its records.
    async fn register_collection(&self, collection: &str, localized_paths: Vec<String>) -> Result<(), StoreError>;

    /// Translate a `where` predicate into a query for `collection`
    ///
    /// With a locale, constraints on localized fields address that locale's
    /// value.
    async fn build_query(
        &self,
        collection: &str,
        predicate: Option<&Predicate>,
        locale: Option<&str>,
    ) -> Result<StoreQuery, StoreError>;

    /// First record matching `query` in `options.sort` order
    ///
    /// Records equal under every sort key are ordered latest-inserted first.
    async fn find_one(&self, query: &StoreQuery, options: &FindOptions) -> Result<Option<Record>, StoreError>;

    /// All matching records, optionally paginated
    async fn find(
        &self,
        query: &StoreQuery,
        options: &FindOptions,
        pagination: Option<Pagination>,
    ) -> Result<PaginatedDocs<Record>, StoreError>;

    /// Insert a record, generating its `id` when absent
    async fn insert(&self, collection: &str, record: Record) -> Result<Record, StoreError>;

    /// Replace the data of the record with `id`
    async fn update(&self, collection: &str, id: &str, record: Record) -> Result<Record, StoreError>;

    /// Delete every record matching `query`, returning how many were removed
    async fn delete_many(&self, query: &StoreQuery) -> Result<usize, StoreError>;
}
