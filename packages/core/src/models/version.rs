//! Version Documents
//!
//! Every change to a versioned entity writes one [`VersionDocument`] into the
//! entity's version collection (`_<slug>_versions`). The snapshot lives under
//! `version`, including its `_status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::document::Record;

/// Key of the publication status inside a version snapshot
pub const STATUS_FIELD: &str = "_status";

/// Publication status of a version snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    Draft,
    Published,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionStatus::Draft => "draft",
            VersionStatus::Published => "published",
        }
    }
}

/// A stored snapshot of a versioned entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDocument {
    pub id: String,

    /// Owning document id (collections only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Full entity data at the time of the change
    pub version: Map<String, Value>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl VersionDocument {
    /// Status recorded in the snapshot, if any
    pub fn status(&self) -> Option<VersionStatus> {
        self.version
            .get(STATUS_FIELD)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    pub fn is_draft(&self) -> bool {
        self.status() == Some(VersionStatus::Draft)
    }

    pub fn from_record(record: Record) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(record))
    }

    pub fn into_record(self) -> Result<Record, serde_json::Error> {
        match serde_json::to_value(self)? {
            Value::Object(record) => Ok(record),
            _ => Ok(Record::new()),
        }
    }
}
