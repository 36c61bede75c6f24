//! Field Tree Types
//!
//! A content type is described by an ordered list of [`Field`]s. Container
//! fields (`array`, `group`, `row`, `blocks`) carry child fields, so the whole
//! description forms a tree of arbitrary depth.
//!
//! ## Example Field Configuration
//!
//! ```json
//! [
//!   { "name": "title", "type": "text", "localized": true },
//!   {
//!     "name": "points",
//!     "type": "array",
//!     "fields": [{ "name": "location", "type": "point" }]
//!   },
//!   {
//!     "type": "row",
//!     "fields": [
//!       { "name": "status", "type": "select", "options": ["draft", "live"] },
//!       { "name": "author", "type": "relationship", "relationTo": "users" }
//!     ]
//!   }
//! ]
//! ```
//!
//! Field types that this crate does not know about still deserialize (as
//! [`FieldKind::Unknown`]) so that newer configuration keeps loading.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of a field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldKind {
    Text,
    Textarea,
    Email,
    Number,
    Checkbox,
    Select,
    Radio,
    Date,
    Point,
    RichText,
    Code,
    Relationship,
    Upload,
    Array,
    Group,
    Row,
    Blocks,
    Ui,
    /// Any tag not listed above
    Unknown(String),
}

impl FieldKind {
    /// The configuration tag for this kind
    pub fn as_str(&self) -> &str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Textarea => "textarea",
            FieldKind::Email => "email",
            FieldKind::Number => "number",
            FieldKind::Checkbox => "checkbox",
            FieldKind::Select => "select",
            FieldKind::Radio => "radio",
            FieldKind::Date => "date",
            FieldKind::Point => "point",
            FieldKind::RichText => "richText",
            FieldKind::Code => "code",
            FieldKind::Relationship => "relationship",
            FieldKind::Upload => "upload",
            FieldKind::Array => "array",
            FieldKind::Group => "group",
            FieldKind::Row => "row",
            FieldKind::Blocks => "blocks",
            FieldKind::Ui => "ui",
            FieldKind::Unknown(tag) => tag,
        }
    }
}

impl From<String> for FieldKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "text" => FieldKind::Text,
            "textarea" => FieldKind::Textarea,
            "email" => FieldKind::Email,
            "number" => FieldKind::Number,
            "checkbox" => FieldKind::Checkbox,
            "select" => FieldKind::Select,
            "radio" => FieldKind::Radio,
            "date" => FieldKind::Date,
            "point" => FieldKind::Point,
            "richText" => FieldKind::RichText,
            "code" => FieldKind::Code,
            "relationship" => FieldKind::Relationship,
            "upload" => FieldKind::Upload,
            "array" => FieldKind::Array,
            "group" => FieldKind::Group,
            "row" => FieldKind::Row,
            "blocks" => FieldKind::Blocks,
            "ui" => FieldKind::Ui,
            _ => FieldKind::Unknown(tag),
        }
    }
}

impl From<FieldKind> for String {
    fn from(kind: FieldKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Option of a `select` or `radio` field
///
/// Accepts both `"value"` and `{ "value": "...", "label": "..." }` forms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SelectOption {
    Plain(String),
    Labeled { value: String, label: String },
}

impl SelectOption {
    /// Stored value of the option
    pub fn value(&self) -> &str {
        match self {
            SelectOption::Plain(value) => value,
            SelectOption::Labeled { value, .. } => value,
        }
    }
}

/// Target(s) of a relationship field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RelationTo {
    Single(String),
    Many(Vec<String>),
}

impl RelationTo {
    /// Slugs this relationship may point at
    pub fn slugs(&self) -> Vec<&str> {
        match self {
            RelationTo::Single(slug) => vec![slug.as_str()],
            RelationTo::Many(slugs) => slugs.iter().map(String::as_str).collect(),
        }
    }

    pub fn is_polymorphic(&self) -> bool {
        matches!(self, RelationTo::Many(_))
    }
}

/// One block type accepted by a `blocks` field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Block type identifier, stored as `blockType` on each block value
    pub slug: String,

    #[serde(default)]
    pub fields: Vec<Field>,
}

/// A node of the field tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Field name (rows and UI fields may omit it)
    #[serde(default)]
    pub name: String,

    #[serde(rename = "type")]
    pub kind: FieldKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default)]
    pub required: bool,

    /// Hidden fields are stored but never queryable
    #[serde(default)]
    pub hidden: bool,

    /// Value is stored per locale as `{ "<locale>": value }`
    #[serde(default)]
    pub localized: bool,

    #[serde(default)]
    pub has_many: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectOption>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_to: Option<RelationTo>,

    /// Children of `array`, `group` and `row` fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,

    /// Block types of a `blocks` field
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Block>,
}

impl Field {
    /// Create a bare field of the given kind
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            label: None,
            required: false,
            hidden: false,
            localized: false,
            has_many: false,
            options: Vec::new(),
            relation_to: None,
            fields: Vec::new(),
            blocks: Vec::new(),
        }
    }

    /// Create a container field with children
    pub fn container(name: impl Into<String>, kind: FieldKind, fields: Vec<Field>) -> Self {
        Self {
            fields,
            ..Self::new(name, kind)
        }
    }

    /// UI-only fields that produce no stored value
    pub fn is_presentational(&self) -> bool {
        matches!(self.kind, FieldKind::Ui)
    }

    /// Whether the field stores a value under its own name
    ///
    /// Rows are layout-only: their children are stored at the row's level.
    pub fn affects_data(&self) -> bool {
        !self.is_presentational() && !matches!(self.kind, FieldKind::Row)
    }

    pub fn has_sub_fields(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Array | FieldKind::Group | FieldKind::Row
        )
    }

    /// Find a direct data-affecting child by name, looking through rows
    pub fn find_child(&self, name: &str) -> Option<&Field> {
        find_field(&self.fields, name)
    }
}

/// Find a data-affecting field by name among siblings, looking through rows
pub fn find_field<'a>(fields: &'a [Field], name: &str) -> Option<&'a Field> {
    fields.iter().find_map(|field| match field.kind {
        FieldKind::Row => find_field(&field.fields, name),
        _ if field.affects_data() && field.name == name => Some(field),
        _ => None,
    })
}

/// Dotted data paths of every localized field in the tree
///
/// Children of a localized container are not listed separately; the locale
/// key sits directly under the container.
///
/// ```
/// use contentforge_core::models::{collect_localized_paths, Field, FieldKind};
///
/// let mut title = Field::new("title", FieldKind::Text);
/// title.localized = true;
/// let mut caption = Field::new("caption", FieldKind::Text);
/// caption.localized = true;
/// let meta = Field::container("meta", FieldKind::Group, vec![caption]);
///
/// let paths = collect_localized_paths(&[title, meta]);
/// assert_eq!(paths, vec!["title".to_string(), "meta.caption".to_string()]);
/// ```
pub fn collect_localized_paths(fields: &[Field]) -> Vec<String> {
    let mut paths = Vec::new();
    collect_localized_into(fields, "", &mut paths);
    paths
}

fn collect_localized_into(fields: &[Field], prefix: &str, paths: &mut Vec<String>) {
    for field in fields {
        match field.kind {
            FieldKind::Row => collect_localized_into(&field.fields, prefix, paths),
            _ if !field.affects_data() => {}
            _ => {
                let path = format!("{}{}", prefix, field.name);
                if field.localized {
                    paths.push(path);
                    continue;
                }
                let nested = format!("{}.", path);
                match field.kind {
                    FieldKind::Array | FieldKind::Group => {
                        collect_localized_into(&field.fields, &nested, paths)
                    }
                    FieldKind::Blocks => {
                        for block in &field.blocks {
                            collect_localized_into(&block.fields, &nested, paths);
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}
