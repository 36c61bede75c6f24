//! Business Services
//!
//! This module contains the content services:
//!
//! - `EntityRegistry` - Compiled collections and globals, built once at startup
//! - `DocumentService` - Reads, writes, drafts and version history
//! - `localization` - Per-locale field values on read and write
//!
//! Services coordinate between the store layer and the HTTP surface,
//! implementing access rules, draft resolution and localization.

pub mod document_service;
pub mod error;
pub mod localization;
pub mod registry;

pub use document_service::{
    DocumentService, FindParams, ReadParams, SaveParams, GLOBALS_COLLECTION, GLOBAL_TYPE_FIELD,
};
pub use error::ContentServiceError;
pub use localization::{localize_record, merge_localized, ALL_LOCALES};
pub use registry::{CompiledEntity, EntityRegistry};
