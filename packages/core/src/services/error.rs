//! Service Layer Error Types
//!
//! Errors returned by [`super::DocumentService`] and the registry. Lower-layer
//! errors are wrapped with `#[from]` so `?` works across layers.

use thiserror::Error;

use crate::db::StoreError;
use crate::query::{PredicateError, SchemaError, WhereValidationError};

/// Service operation errors
#[derive(Error, Debug)]
pub enum ContentServiceError {
    /// No collection or global with this slug
    #[error("Unknown {kind}: {slug}")]
    EntityNotFound { kind: &'static str, slug: String },

    /// Document not found (or not visible to the reader)
    #[error("Document not found in '{slug}': {id}")]
    DocumentNotFound { slug: String, id: String },

    /// Read access rule denies the request
    #[error("Not allowed to read '{slug}'")]
    Forbidden { slug: String },

    /// Operation needs versions but the entity has none
    #[error("'{slug}' is not versioned")]
    NotVersioned { slug: String },

    /// `where` argument is malformed
    #[error("Invalid where clause: {0}")]
    InvalidPredicate(#[from] PredicateError),

    /// `where` argument does not fit the compiled schema
    #[error("Invalid where clause: {0}")]
    InvalidWhere(#[from] WhereValidationError),

    /// Schema compilation failed while building the registry
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Request data is malformed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Store operation failed
    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ContentServiceError {
    /// Create an unknown collection error
    pub fn collection_not_found(slug: impl Into<String>) -> Self {
        Self::EntityNotFound {
            kind: "collection",
            slug: slug.into(),
        }
    }

    /// Create an unknown global error
    pub fn global_not_found(slug: impl Into<String>) -> Self {
        Self::EntityNotFound {
            kind: "global",
            slug: slug.into(),
        }
    }

    /// Create a document not found error
    pub fn document_not_found(slug: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DocumentNotFound {
            slug: slug.into(),
            id: id.into(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden(slug: impl Into<String>) -> Self {
        Self::Forbidden { slug: slug.into() }
    }

    /// Create a not versioned error
    pub fn not_versioned(slug: impl Into<String>) -> Self {
        Self::NotVersioned { slug: slug.into() }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
