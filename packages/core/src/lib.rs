//! ContentForge Core
//!
//! Content-management backend core: collections and globals are declared as
//! field trees, compiled into query schemas and served over REST with
//! localization, version history and drafts.
//!
//! # Architecture
//!
//! - **Where-schema compiler**: field trees flatten into `__`-joined query
//!   paths, each with the operators its field type allows
//! - **Predicates**: `where` arguments as typed `and` / `or` trees
//! - **Versions and drafts**: every change of a versioned entity is kept as a
//!   snapshot; draft reads overlay the newest eligible draft
//! - **Document store**: abstract store trait with an in-memory backend
//!
//! # Modules
//!
//! - [`models`] - Field trees, entity configuration, documents
//! - [`query`] - Operators, predicates, where-schema compiler
//! - [`db`] - Document store trait, in-memory store, predicate evaluation
//! - [`versions`] - Version history and draft resolution
//! - [`services`] - Entity registry, document service, localization
//! - [`http`] - axum REST surface
//! - [`config`] - JSON configuration and environment overrides
//! - [`telemetry`] - `tracing` subscriber setup

pub mod config;
pub mod db;
pub mod http;
pub mod models;
pub mod query;
pub mod services;
pub mod telemetry;
pub mod versions;

// Re-export commonly used types
pub use config::{ConfigError, ContentConfig};
pub use db::{DocumentStore, MemoryStore, StoreError};
pub use models::*;
pub use query::{compile_where_schema, Operator, Predicate, WhereSchema};
pub use services::{ContentServiceError, DocumentService, EntityRegistry};
