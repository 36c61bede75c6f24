//! Store Error Types
//!
//! Errors raised by document store implementations. Services propagate them
//! unchanged; nothing in the store layer retries.

use thiserror::Error;

use crate::query::Operator;

/// Document store operation errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// Collection was never registered with the store
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// No document with the given id
    #[error("Document '{id}' not found in '{collection}'")]
    DocumentNotFound { collection: String, id: String },

    /// Insert with an id that is already taken
    #[error("Document '{id}' already exists in '{collection}'")]
    DuplicateId { collection: String, id: String },

    /// Operator value the store cannot evaluate
    #[error("Invalid value for '{operator}' on '{path}': {reason}")]
    InvalidOperand {
        path: String,
        operator: Operator,
        reason: String,
    },

    /// Stored record could not be converted
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend could not serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Create an unknown collection error
    pub fn unknown_collection(collection: impl Into<String>) -> Self {
        Self::UnknownCollection(collection.into())
    }

    /// Create a document not found error
    pub fn document_not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DocumentNotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Create a duplicate id error
    pub fn duplicate_id(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DuplicateId {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Create an invalid operand error
    pub fn invalid_operand(path: impl Into<String>, operator: Operator, reason: impl Into<String>) -> Self {
        Self::InvalidOperand {
            path: path.into(),
            operator,
            reason: reason.into(),
        }
    }

    /// Create a store unavailable error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
