//! Storage Layer
//!
//! Persistence sits behind the [`DocumentStore`] trait:
//!
//! - `store` - The trait, query/sort/pagination types and result pages
//! - `filter` - Predicate evaluation over JSON records
//! - `memory_store` - In-process implementation for the dev server and tests
//!
//! Versions of an entity live in their own collection (`_<slug>_versions`)
//! of the same store.

mod error;
pub mod filter;
mod memory_store;
mod store;

pub use error::StoreError;
pub use memory_store::MemoryStore;
pub use store::{
    sanitize_internal_fields, DocumentStore, FindOptions, PaginatedDocs, Pagination, SortDirection, SortKey,
    StoreQuery, REVISION_FIELD, SEQ_FIELD,
};
