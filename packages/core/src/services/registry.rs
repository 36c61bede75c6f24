//! Entity Registry
//!
//! Built once at startup from [`ContentConfig`]: every collection and global
//! is compiled into its where-schema (and, when versioned, the where-schema
//! of its version collection). The registry is immutable afterwards and is
//! shared behind an `Arc`.

use std::collections::BTreeMap;

use super::error::ContentServiceError;
use crate::config::ContentConfig;
use crate::models::{
    collect_localized_paths, find_field, AccessResult, EntityConfig, EntityKind, Field, FieldKind, Labels, RelationTo,
    SelectOption, VersionStatus, STATUS_FIELD,
};
use crate::query::{compile_where_schema, format_name, PredicateError, SchemaError, WhereSchema};

/// `geolocation-points` -> `GeolocationPoints`
fn to_words(raw: &str) -> String {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Type-name-safe labels; identical singular and plural get `all<Label>`
fn resolve_labels(config: &EntityConfig) -> Labels {
    let (singular, plural) = match &config.labels {
        Some(labels) => (to_words(&labels.singular), to_words(&labels.plural)),
        None => {
            let plural = to_words(&config.slug);
            let singular = match plural.strip_suffix('s') {
                Some(stem) if !stem.is_empty() => stem.to_string(),
                _ => plural.clone(),
            };
            (singular, plural)
        }
    };

    let singular = format_name(&singular);
    let plural = format_name(&plural);
    let plural = if plural == singular {
        format!("all{}", singular)
    } else {
        plural
    };

    Labels { singular, plural }
}

/// Append `createdAt` / `updatedAt` date fields unless already declared
fn push_timestamp_fields(fields: &mut Vec<Field>) {
    for name in ["createdAt", "updatedAt"] {
        if find_field(fields.as_slice(), name).is_none() {
            fields.push(Field::new(name, FieldKind::Date));
        }
    }
}

/// Field tree of the version collection for an entity
fn version_fields(config: &EntityConfig, kind: EntityKind) -> Vec<Field> {
    let mut snapshot = config.fields.clone();
    if config.drafts_enabled() {
        let mut status = Field::new(STATUS_FIELD, FieldKind::Select);
        status.options = [VersionStatus::Draft, VersionStatus::Published]
            .iter()
            .map(|s| SelectOption::Plain(s.as_str().to_string()))
            .collect();
        snapshot.push(status);
    }
    if config.timestamps {
        push_timestamp_fields(&mut snapshot);
    }

    let mut fields = Vec::new();
    if kind == EntityKind::Collection {
        let mut parent = Field::new("parent", FieldKind::Relationship);
        parent.relation_to = Some(RelationTo::Single(config.slug.clone()));
        fields.push(parent);
    }
    fields.push(Field::container("version", FieldKind::Group, snapshot));
    push_timestamp_fields(&mut fields);
    fields
}

/// One entity with everything derived from its configuration
#[derive(Debug, Clone)]
pub struct CompiledEntity {
    pub config: EntityConfig,
    pub kind: EntityKind,
    pub labels: Labels,
    pub where_schema: WhereSchema,
    pub version_where_schema: Option<WhereSchema>,
    /// Dotted paths of localized fields
    pub localized_paths: Vec<String>,
}

impl CompiledEntity {
    pub fn compile(config: EntityConfig, kind: EntityKind) -> Result<Self, SchemaError> {
        let labels = resolve_labels(&config);

        let mut fields = config.fields.clone();
        if config.timestamps {
            push_timestamp_fields(&mut fields);
        }
        let where_schema = compile_where_schema(&labels.singular, &fields)?;

        let version_where_schema = if config.is_versioned() {
            Some(compile_where_schema(
                &format!("{}Version", labels.singular),
                &version_fields(&config, kind),
            )?)
        } else {
            None
        };

        Ok(Self {
            localized_paths: collect_localized_paths(&config.fields),
            config,
            kind,
            labels,
            where_schema,
            version_where_schema,
        })
    }

    pub fn slug(&self) -> &str {
        &self.config.slug
    }

    /// Resolve the entity's declarative read rule
    pub fn read_access(&self) -> Result<AccessResult, PredicateError> {
        self.config.access.read.resolve()
    }

    /// Localized paths as stored inside version snapshots
    pub fn version_localized_paths(&self) -> Vec<String> {
        self.localized_paths
            .iter()
            .map(|path| format!("version.{}", path))
            .collect()
    }
}

/// All compiled collections and globals
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    collections: BTreeMap<String, CompiledEntity>,
    globals: BTreeMap<String, CompiledEntity>,
}

impl EntityRegistry {
    /// Compile every entity of a configuration
    ///
    /// Fails on the first path collision.
    pub fn build(config: &ContentConfig) -> Result<Self, SchemaError> {
        let mut registry = Self::default();

        for collection in &config.collections {
            let compiled = CompiledEntity::compile(collection.clone(), EntityKind::Collection)?;
            registry.collections.insert(compiled.slug().to_string(), compiled);
        }
        for global in &config.globals {
            let compiled = CompiledEntity::compile(global.clone(), EntityKind::Global)?;
            registry.globals.insert(compiled.slug().to_string(), compiled);
        }

        tracing::info!(
            "Entity registry built: {} collections, {} globals",
            registry.collections.len(),
            registry.globals.len()
        );
        Ok(registry)
    }

    pub fn collection(&self, slug: &str) -> Result<&CompiledEntity, ContentServiceError> {
        self.collections
            .get(slug)
            .ok_or_else(|| ContentServiceError::collection_not_found(slug))
    }

    pub fn global(&self, slug: &str) -> Result<&CompiledEntity, ContentServiceError> {
        self.globals
            .get(slug)
            .ok_or_else(|| ContentServiceError::global_not_found(slug))
    }

    pub fn collections(&self) -> impl Iterator<Item = &CompiledEntity> {
        self.collections.values()
    }

    pub fn globals(&self) -> impl Iterator<Item = &CompiledEntity> {
        self.globals.values()
    }
}
