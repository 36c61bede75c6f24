//! Where-Schema Compiler
//!
//! Turns an entity's field tree into the flat mapping of filterable query
//! paths used to validate and execute `where` arguments.
//!
//! ## Path Rules
//!
//! - Leaf fields compile to their own name, prefixed by every enclosing
//!   container (`points__location`).
//! - `array`, `group` and `blocks` prefix their children with `<name>__` and
//!   splice them flat into the parent mapping; they never become a nested
//!   input object.
//! - `row` is layout only and splices its children without any prefix.
//! - UI and `hidden` fields are skipped, and so are field types without a
//!   builder.
//! - A synthetic `id` path is always present.
//!
//! ## Example
//!
//! ```rust
//! use contentforge_core::models::{Field, FieldKind};
//! use contentforge_core::query::{compile_where_schema, Operator};
//!
//! let fields = vec![
//!     Field::new("title", FieldKind::Text),
//!     Field::container("points", FieldKind::Array, vec![Field::new("location", FieldKind::Point)]),
//! ];
//!
//! let schema = compile_where_schema("Geolocation", &fields).unwrap();
//! assert!(schema.get("title").is_some());
//! assert!(schema.get("points__location").unwrap().allows(Operator::Near));
//! assert!(schema.get("id").unwrap().allows(Operator::In));
//! ```

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use super::operators::{union, Operator, OperatorCategory};
use super::predicate::{Constraint, Predicate};
use crate::models::{Field, FieldKind, SelectOption};

/// Separator between container names in a query path
pub const PATH_SEPARATOR: &str = "__";

/// Configuration errors raised while compiling a schema
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// Two distinct fields compile to the same query path
    #[error("Query path '{path}' in '{schema}' is declared more than once")]
    PathCollision { schema: String, path: String },

    /// Two distinct paths produce the same generated type name
    #[error("Type name '{name}' in '{schema}' is generated more than once")]
    TypeNameCollision { schema: String, name: String },
}

/// A `where` argument that does not fit the compiled schema
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WhereValidationError {
    #[error("'{path}' is not a queryable path of {schema}")]
    UnknownPath { schema: String, path: String },

    #[error("Operator '{operator}' is not allowed on '{path}'")]
    OperatorNotAllowed { path: String, operator: Operator },

    #[error("'{value}' is not a valid option for '{path}'")]
    InvalidOption { path: String, value: String },
}

/// Built-in scalar input types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScalarType {
    String,
    Float,
    Boolean,
    DateTime,
    EmailAddress,
    #[serde(rename = "JSON")]
    Json,
}

/// Value of a generated enum type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumValue {
    /// Identifier-safe name
    pub name: String,
    /// Stored value
    pub value: String,
}

/// A generated enum input type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumType {
    pub name: String,
    pub values: Vec<EnumValue>,
}

impl EnumType {
    /// Repeated values are kept once; values whose names clash get `_2`, `_3`...
    fn from_values<'a>(name: String, values: impl IntoIterator<Item = &'a str>) -> Self {
        let mut enum_values: Vec<EnumValue> = Vec::new();
        for value in values {
            if enum_values.iter().any(|existing| existing.value == value) {
                continue;
            }
            let formatted = format_name(value);
            let mut candidate = formatted.clone();
            let mut suffix = 2;
            while enum_values.iter().any(|existing| existing.name == candidate) {
                candidate = format!("{}_{}", formatted, suffix);
                suffix += 1;
            }
            enum_values.push(EnumValue {
                name: candidate,
                value: value.to_string(),
            });
        }
        Self {
            name,
            values: enum_values,
        }
    }

    pub fn contains_value(&self, value: &str) -> bool {
        self.values.iter().any(|v| v.value == value)
    }
}

/// Input type accepted by a query path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum QueryValueType {
    Scalar { scalar: ScalarType },
    Enum { enum_type: EnumType },
    /// `{ relationTo, value }` for relationships to several collections
    Relation {
        name: String,
        relation_to: EnumType,
    },
    List { of: Box<QueryValueType> },
}

impl QueryValueType {
    fn scalar(scalar: ScalarType) -> Self {
        QueryValueType::Scalar { scalar }
    }

    fn list(of: QueryValueType) -> Self {
        QueryValueType::List { of: Box::new(of) }
    }

    /// Names of the generated types this value type introduces
    fn type_names(&self) -> Vec<&str> {
        match self {
            QueryValueType::Scalar { .. } => Vec::new(),
            QueryValueType::Enum { enum_type } => vec![enum_type.name.as_str()],
            QueryValueType::Relation { name, relation_to } => vec![name.as_str(), relation_to.name.as_str()],
            QueryValueType::List { of } => of.type_names(),
        }
    }
}

/// One operator accepted on a path, with the input it expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorInput {
    pub operator: Operator,
    pub value_type: QueryValueType,
    #[serde(skip_serializing_if = "no_sub_arguments")]
    pub sub_arguments: &'static [&'static str],
}

fn no_sub_arguments(arguments: &&'static [&'static str]) -> bool {
    arguments.is_empty()
}

/// A filterable query path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryField {
    /// Name of the generated operator input type
    pub input_name: String,
    /// Field type tag the path was compiled from
    pub field_type: String,
    /// Shape of the stored value (list-wrapped for `hasMany`)
    pub value_type: QueryValueType,
    /// Stored value is a list of the base type
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub has_many: bool,
    pub operators: Vec<OperatorInput>,
}

impl QueryField {
    fn new(
        parent_name: &str,
        path: &str,
        field_type: &str,
        base: QueryValueType,
        has_many: bool,
        categories: &[OperatorCategory],
    ) -> Self {
        let operators = union(categories)
            .into_iter()
            .map(|operator| OperatorInput {
                operator,
                value_type: if operator.takes_list() {
                    QueryValueType::list(base.clone())
                } else {
                    base.clone()
                },
                sub_arguments: operator.sub_arguments(),
            })
            .collect();

        Self {
            input_name: format!("{}_operator", combine_parent_name(parent_name, path)),
            field_type: field_type.to_string(),
            value_type: if has_many { QueryValueType::list(base) } else { base },
            has_many,
            operators,
        }
    }

    /// Type of one stored value; a point stays a coordinate pair
    pub fn base_type(&self) -> &QueryValueType {
        match &self.value_type {
            QueryValueType::List { of } if self.has_many => of,
            other => other,
        }
    }

    pub fn allows(&self, operator: Operator) -> bool {
        self.operators.iter().any(|input| input.operator == operator)
    }

    pub fn operator_set(&self) -> Vec<Operator> {
        self.operators.iter().map(|input| input.operator).collect()
    }
}

/// Compiled filterable-field schema of one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WhereSchema {
    pub name: String,
    pub fields: BTreeMap<String, QueryField>,
}

impl WhereSchema {
    /// Look up a path in either `__` or dotted form
    pub fn get(&self, path: &str) -> Option<&QueryField> {
        self.fields.get(&to_query_path(path))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check every leaf of a `where` predicate against the schema
    pub fn validate(&self, predicate: &Predicate) -> Result<(), WhereValidationError> {
        predicate
            .flatten()
            .into_iter()
            .try_for_each(|constraint| self.validate_constraint(constraint))
    }

    fn validate_constraint(&self, constraint: &Constraint) -> Result<(), WhereValidationError> {
        let field = self
            .get(&constraint.path)
            .ok_or_else(|| WhereValidationError::UnknownPath {
                schema: self.name.clone(),
                path: constraint.path.clone(),
            })?;

        if !field.allows(constraint.operator) {
            return Err(WhereValidationError::OperatorNotAllowed {
                path: constraint.path.clone(),
                operator: constraint.operator,
            });
        }

        if let QueryValueType::Enum { enum_type } = field.base_type() {
            if constraint.operator.category() != OperatorCategory::Equality {
                return Ok(());
            }
            // List operators also take a comma-separated string
            let candidates: Vec<&str> = match &constraint.value {
                serde_json::Value::Array(items) => items.iter().filter_map(|item| item.as_str()).collect(),
                serde_json::Value::String(csv) if constraint.operator.takes_list() => {
                    csv.split(',').map(str::trim).collect()
                }
                single => single.as_str().into_iter().collect(),
            };
            if let Some(unknown) = candidates.into_iter().find(|text| !enum_type.contains_value(text)) {
                return Err(WhereValidationError::InvalidOption {
                    path: constraint.path.clone(),
                    value: unknown.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Convert a dotted data path into its query path form
pub fn to_query_path(path: &str) -> String {
    path.replace('.', PATH_SEPARATOR)
}

/// Make a string usable as a type or enum name
///
/// Leading digits get an underscore, punctuation becomes `_`, spaces and
/// other characters are dropped.
pub fn format_name(raw: &str) -> String {
    let mut formatted = String::with_capacity(raw.len() + 1);
    if raw.starts_with(|c: char| c.is_ascii_digit()) {
        formatted.push('_');
    }
    for c in raw.chars() {
        match c {
            '.' | '-' | '/' | '+' | ',' | '(' | ')' | '\'' => formatted.push('_'),
            c if c.is_ascii_alphanumeric() || c == '_' => formatted.push(c),
            _ => {}
        }
    }
    if formatted.is_empty() {
        formatted.push('_');
    }
    formatted
}

/// `<Parent>_<name>` in type-name form
pub fn combine_parent_name(parent_name: &str, name: &str) -> String {
    format_name(&format!("{}_{}", parent_name, name))
}

type Paths = BTreeMap<String, QueryField>;

/// Compile a field list into a where-schema named after `parent_name`
pub fn compile_where_schema(parent_name: &str, fields: &[Field]) -> Result<WhereSchema, SchemaError> {
    let mut paths = compile_fields(fields, parent_name, "")?;

    // Every entity is addressable by id, declared or not
    paths.insert(
        "id".to_string(),
        QueryField::new(
            parent_name,
            "id",
            "id",
            QueryValueType::scalar(ScalarType::Json),
            false,
            &[OperatorCategory::Equality, OperatorCategory::Contains],
        ),
    );

    ensure_unique_type_names(&paths, parent_name)?;

    tracing::debug!("Compiled where-schema '{}' with {} paths", parent_name, paths.len());

    Ok(WhereSchema {
        name: format_name(parent_name),
        fields: paths,
    })
}

fn compile_fields(fields: &[Field], parent_name: &str, prefix: &str) -> Result<Paths, SchemaError> {
    let mut paths = Paths::new();

    for field in fields {
        if field.is_presentational() || field.hidden {
            continue;
        }

        match field.kind {
            FieldKind::Row => {
                let spliced = compile_fields(&field.fields, parent_name, prefix)?;
                splice(&mut paths, spliced, parent_name)?;
            }
            FieldKind::Array | FieldKind::Group => {
                let nested_prefix = format!("{}{}{}", prefix, field.name, PATH_SEPARATOR);
                let spliced = compile_fields(&field.fields, parent_name, &nested_prefix)?;
                splice(&mut paths, spliced, parent_name)?;
            }
            FieldKind::Blocks => {
                let spliced = compile_blocks(field, parent_name, prefix)?;
                splice(&mut paths, spliced, parent_name)?;
            }
            _ => {
                let path = format!("{}{}", prefix, field.name);
                match build_leaf(field, parent_name, &path) {
                    Some(query_field) => insert_unique(&mut paths, path, query_field, parent_name)?,
                    None => tracing::debug!(
                        "Field '{}' of type '{}' is not filterable, skipping",
                        path,
                        field.kind
                    ),
                }
            }
        }
    }

    Ok(paths)
}

/// Blocks contribute `<name>__blockType` plus the union of every block's paths
///
/// The same child declared identically in several block types addresses one
/// storage path and is merged; differing declarations collide.
fn compile_blocks(field: &Field, parent_name: &str, prefix: &str) -> Result<Paths, SchemaError> {
    let nested_prefix = format!("{}{}{}", prefix, field.name, PATH_SEPARATOR);
    let mut paths = Paths::new();

    let block_type_path = format!("{}blockType", nested_prefix);
    let block_type = EnumType::from_values(
        format!("{}_BlockType", combine_parent_name(parent_name, &format!("{}{}", prefix, field.name))),
        field.blocks.iter().map(|block| block.slug.as_str()),
    );
    paths.insert(
        block_type_path.clone(),
        QueryField::new(
            parent_name,
            &block_type_path,
            "blockType",
            QueryValueType::Enum { enum_type: block_type },
            false,
            &[OperatorCategory::Equality],
        ),
    );

    for block in &field.blocks {
        for (path, query_field) in compile_fields(&block.fields, parent_name, &nested_prefix)? {
            match paths.get(&path) {
                Some(existing) if *existing != query_field || path == block_type_path => {
                    return Err(SchemaError::PathCollision {
                        schema: parent_name.to_string(),
                        path,
                    });
                }
                Some(_) => {}
                None => {
                    paths.insert(path, query_field);
                }
            }
        }
    }

    Ok(paths)
}

/// Distinct paths can still format to the same type name (`a-b`, `a_b`)
fn ensure_unique_type_names(paths: &Paths, parent_name: &str) -> Result<(), SchemaError> {
    let mut seen = BTreeSet::new();
    for query_field in paths.values() {
        let names = std::iter::once(query_field.input_name.as_str()).chain(query_field.value_type.type_names());
        for name in names {
            if !seen.insert(name) {
                return Err(SchemaError::TypeNameCollision {
                    schema: parent_name.to_string(),
                    name: name.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn splice(target: &mut Paths, source: Paths, parent_name: &str) -> Result<(), SchemaError> {
    for (path, query_field) in source {
        insert_unique(target, path, query_field, parent_name)?;
    }
    Ok(())
}

fn insert_unique(
    target: &mut Paths,
    path: String,
    query_field: QueryField,
    parent_name: &str,
) -> Result<(), SchemaError> {
    if target.contains_key(&path) {
        return Err(SchemaError::PathCollision {
            schema: parent_name.to_string(),
            path,
        });
    }
    target.insert(path, query_field);
    Ok(())
}

/// Type-specific builder for a leaf field; `None` means not filterable
fn build_leaf(field: &Field, parent_name: &str, path: &str) -> Option<QueryField> {
    use OperatorCategory::{Comparison, Contains, Equality, Geo, Pattern};

    let leaf = |base: QueryValueType, categories: &[OperatorCategory]| {
        QueryField::new(parent_name, path, field.kind.as_str(), base, field.has_many, categories)
    };

    let query_field = match &field.kind {
        FieldKind::Number => leaf(QueryValueType::scalar(ScalarType::Float), &[Equality, Comparison]),
        FieldKind::Text | FieldKind::Textarea | FieldKind::Code => {
            leaf(QueryValueType::scalar(ScalarType::String), &[Equality, Pattern])
        }
        FieldKind::Email => leaf(QueryValueType::scalar(ScalarType::EmailAddress), &[Equality, Pattern]),
        FieldKind::RichText => leaf(QueryValueType::scalar(ScalarType::Json), &[Equality, Pattern]),
        FieldKind::Radio => leaf(option_enum(field, parent_name, path), &[Equality, Pattern]),
        FieldKind::Select => leaf(option_enum(field, parent_name, path), &[Equality, Contains]),
        FieldKind::Date => leaf(QueryValueType::scalar(ScalarType::DateTime), &[Equality, Comparison, Pattern]),
        FieldKind::Point => leaf(
            QueryValueType::list(QueryValueType::scalar(ScalarType::Float)),
            &[Equality, Comparison, Geo],
        ),
        FieldKind::Relationship => {
            let base = match &field.relation_to {
                Some(relation_to) if relation_to.is_polymorphic() => {
                    let name = format!("{}_Relation", combine_parent_name(parent_name, path));
                    QueryValueType::Relation {
                        relation_to: EnumType::from_values(
                            format!("{}_RelationTo", name),
                            relation_to.slugs(),
                        ),
                        name,
                    }
                }
                _ => QueryValueType::scalar(ScalarType::String),
            };
            leaf(base, &[Equality, Contains])
        }
        FieldKind::Upload => leaf(QueryValueType::scalar(ScalarType::String), &[Equality]),
        FieldKind::Checkbox => leaf(QueryValueType::scalar(ScalarType::Boolean), &[Equality]),
        FieldKind::Array
        | FieldKind::Group
        | FieldKind::Row
        | FieldKind::Blocks
        | FieldKind::Ui
        | FieldKind::Unknown(_) => return None,
    };

    Some(query_field)
}

fn option_enum(field: &Field, parent_name: &str, path: &str) -> QueryValueType {
    QueryValueType::Enum {
        enum_type: EnumType::from_values(
            format!("{}_Input", combine_parent_name(parent_name, path)),
            field.options.iter().map(SelectOption::value),
        ),
    }
}

#[cfg(test)]
#[path = "where_schema_test.rs"]
mod where_schema_test;
