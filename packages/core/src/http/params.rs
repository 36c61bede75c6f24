//! Query string parameters shared by the endpoints
//!
//! `where` travels as a JSON-encoded string:
//!
//! ```text
//! GET /api/posts?where={"title":{"like":"hello"}}&sort=-updatedAt&limit=5&locale=de
//! ```

use serde::Deserialize;
use serde_json::Value;

use super::HttpError;
use crate::db::SortKey;
use crate::services::{FindParams, ReadParams, SaveParams};

/// Query string of list endpoints
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(rename = "where")]
    pub where_clause: Option<String>,
    pub sort: Option<String>,
    pub page: Option<usize>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub draft: bool,
    pub locale: Option<String>,
    pub fallback_locale: Option<String>,
}

impl ListQuery {
    pub fn into_params(self) -> Result<FindParams, HttpError> {
        let where_clause = match self.where_clause.as_deref() {
            None | Some("") => None,
            Some(raw) => Some(serde_json::from_str::<Value>(raw).map_err(|e| {
                HttpError::with_details("'where' must be a JSON object", "INVALID_WHERE", e.to_string())
            })?),
        };

        Ok(FindParams {
            where_clause,
            sort: self.sort.as_deref().map(SortKey::parse_list).unwrap_or_default(),
            page: self.page,
            limit: self.limit,
            draft: self.draft,
            locale: self.locale,
            fallback_locale: self.fallback_locale,
        })
    }
}

/// Query string of single-document reads
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadQuery {
    #[serde(default)]
    pub draft: bool,
    pub locale: Option<String>,
    pub fallback_locale: Option<String>,
}

impl From<ReadQuery> for ReadParams {
    fn from(query: ReadQuery) -> Self {
        ReadParams {
            draft: query.draft,
            locale: query.locale,
            fallback_locale: query.fallback_locale,
        }
    }
}

/// Query string of writes
#[derive(Debug, Default, Deserialize)]
pub struct SaveQuery {
    #[serde(default)]
    pub draft: bool,
    pub locale: Option<String>,
}

impl From<SaveQuery> for SaveParams {
    fn from(query: SaveQuery) -> Self {
        SaveParams {
            draft: query.draft,
            locale: query.locale,
        }
    }
}
