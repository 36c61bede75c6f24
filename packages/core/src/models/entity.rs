//! Entity Configuration
//!
//! Collections and globals share one configuration shape. Which of the two an
//! entity is comes from where it is declared in [`crate::config::ContentConfig`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::access::AccessResult;
use super::field::Field;
use crate::query::{Predicate, PredicateError};

/// Collection (many documents) or global (singleton)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Collection,
    Global,
}

/// Display labels of an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    pub singular: String,
    pub plural: String,
}

/// Versioning settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionsConfig {
    /// Enables draft saves and draft reads
    #[serde(default)]
    pub drafts: bool,

    /// Versions kept per document, 0 keeps everything
    #[serde(default = "default_max_per_doc")]
    pub max_per_doc: usize,
}

fn default_max_per_doc() -> usize {
    100
}

impl Default for VersionsConfig {
    fn default() -> Self {
        Self {
            drafts: false,
            max_per_doc: default_max_per_doc(),
        }
    }
}

/// A read rule: `true`, `false`, or a where-predicate in JSON form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccessRule {
    Allow(bool),
    Where(Value),
}

impl Default for AccessRule {
    fn default() -> Self {
        AccessRule::Allow(true)
    }
}

impl AccessRule {
    /// Evaluate the rule into an access result
    pub fn resolve(&self) -> Result<AccessResult, PredicateError> {
        match self {
            AccessRule::Allow(true) => Ok(AccessResult::Unrestricted),
            AccessRule::Allow(false) => Ok(AccessResult::Denied),
            AccessRule::Where(value) => Ok(AccessResult::Scoped(Predicate::from_value(value)?)),
        }
    }
}

/// Access rules of an entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccessConfig {
    #[serde(default)]
    pub read: AccessRule,
}

/// Declarative description of a collection or global
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityConfig {
    pub slug: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Labels>,

    #[serde(default)]
    pub fields: Vec<Field>,

    /// Maintain `createdAt` / `updatedAt`
    #[serde(default = "default_timestamps")]
    pub timestamps: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<VersionsConfig>,

    #[serde(default)]
    pub access: AccessConfig,
}

fn default_timestamps() -> bool {
    true
}

impl EntityConfig {
    /// Create a timestamped, unversioned entity
    pub fn new(slug: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            slug: slug.into(),
            labels: None,
            fields,
            timestamps: true,
            versions: None,
            access: AccessConfig::default(),
        }
    }

    /// Enable versions with drafts
    pub fn with_drafts(mut self) -> Self {
        self.versions = Some(VersionsConfig {
            drafts: true,
            ..VersionsConfig::default()
        });
        self
    }

    pub fn with_read_access(mut self, rule: AccessRule) -> Self {
        self.access.read = rule;
        self
    }

    pub fn is_versioned(&self) -> bool {
        self.versions.is_some()
    }

    pub fn drafts_enabled(&self) -> bool {
        self.versions.as_ref().map(|v| v.drafts).unwrap_or(false)
    }

    /// Name of the collection holding this entity's versions
    pub fn versions_collection(&self) -> String {
        format!("_{}_versions", self.slug)
    }
}
