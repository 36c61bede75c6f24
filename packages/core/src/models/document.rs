//! Document Data Structures
//!
//! A [`Document`] is one stored entry of a collection (or the single entry of
//! a global). Entity-specific data lives in the flattened `data` map, the
//! envelope carries the id and timestamps that the versioning subsystem keys
//! off.
//!
//! ```rust
//! use contentforge_core::models::Document;
//! use serde_json::json;
//!
//! let doc: Document = serde_json::from_value(json!({
//!     "id": "42",
//!     "title": "Hello",
//!     "createdAt": "2024-01-01T00:00:00Z",
//!     "updatedAt": "2024-01-02T00:00:00Z"
//! }))
//! .unwrap();
//!
//! assert!(doc.has_timestamps());
//! assert_eq!(doc.data["title"], "Hello");
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw record shape exchanged with document stores
pub type Record = Map<String, Value>;

/// A timestamp in the same RFC 3339 form the serde impls write
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// A stored document with its id and timestamp envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// All entity fields, keyed by field name
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Document {
    /// Create an empty document with the given id and no timestamps
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: None,
            updated_at: None,
            data: Map::new(),
        }
    }

    /// Create a document carrying both timestamps
    pub fn with_timestamps(
        id: impl Into<String>,
        data: Map<String, Value>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            created_at: Some(created_at),
            updated_at: Some(updated_at),
            data,
        }
    }

    /// Only documents with both timestamps take part in versioning
    pub fn has_timestamps(&self) -> bool {
        self.created_at.is_some() && self.updated_at.is_some()
    }

    /// Convert a store record into a document
    pub fn from_record(record: Record) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(record))
    }

    /// Convert this document into a store record
    pub fn into_record(self) -> Result<Record, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(record) => Ok(record),
            // Document always serializes to an object
            _ => Ok(Record::new()),
        }
    }
}
