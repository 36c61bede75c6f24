//! Data Models
//!
//! This module contains the data structures shared by the compiler, the
//! stores and the services:
//!
//! - `Field` - Recursive field tree describing an entity's data shape
//! - `EntityConfig` - Collection / global configuration
//! - `Document` - Stored document with id and timestamps
//! - `VersionDocument` - Snapshot written on every change of a versioned entity
//! - `AccessResult` - Outcome of a read access rule

mod access;
mod document;
mod entity;
mod field;
mod version;

pub use access::AccessResult;
pub use document::{timestamp_value, Document, Record};
pub use entity::{AccessConfig, AccessRule, EntityConfig, EntityKind, Labels, VersionsConfig};
pub use field::{collect_localized_paths, find_field, Block, Field, FieldKind, RelationTo, SelectOption};
pub use version::{VersionDocument, VersionStatus, STATUS_FIELD};
