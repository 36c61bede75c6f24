//! ContentForge Configuration
//!
//! One JSON document declares the collections, globals, localization and
//! server settings:
//!
//! ```json
//! {
//!   "collections": [{ "slug": "posts", "fields": [{ "name": "title", "type": "text" }] }],
//!   "globals": [{ "slug": "settings", "fields": [] }],
//!   "localization": { "locales": ["en", "de"], "defaultLocale": "en" },
//!   "server": { "port": 3000 },
//!   "pagination": { "defaultLimit": 10, "maxLimit": 100 }
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `CONTENTFORGE_CONFIG`: Path of the configuration file
//! - `CONTENTFORGE_PORT`: Overrides `server.port`

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::EntityConfig;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "CONTENTFORGE_CONFIG";

/// Environment variable overriding the server port
pub const PORT_ENV: &str = "CONTENTFORGE_PORT";

/// Collection slugs taken by the store layout and the REST routes
const RESERVED_SLUGS: &[&str] = &["globals"];

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Slug '{0}' is declared more than once")]
    DuplicateSlug(String),

    #[error("Entity slugs cannot be empty")]
    EmptySlug,

    #[error("Slug '{0}' is reserved")]
    ReservedSlug(String),

    #[error("Localization needs at least one locale")]
    NoLocales,

    #[error("Default locale '{0}' is not one of the configured locales")]
    UnknownDefaultLocale(String),

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    #[error("Invalid port in {PORT_ENV}: '{0}'")]
    InvalidPort(String),
}

/// Locales documents can be stored in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalizationConfig {
    pub locales: Vec<String>,
    pub default_locale: String,
    /// Fall back to the default locale when a value is missing
    #[serde(default = "default_true")]
    pub fallback: bool,
}

fn default_true() -> bool {
    true
}

impl LocalizationConfig {
    pub fn has_locale(&self, locale: &str) -> bool {
        self.locales.iter().any(|l| l == locale)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

fn default_limit() -> usize {
    10
}

fn default_max_limit() -> usize {
    100
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl PaginationConfig {
    /// Requested limit, defaulted and capped
    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested
            .filter(|limit| *limit > 0)
            .unwrap_or(self.default_limit)
            .min(self.max_limit)
    }
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentConfig {
    #[serde(default)]
    pub collections: Vec<EntityConfig>,

    #[serde(default)]
    pub globals: Vec<EntityConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localization: Option<LocalizationConfig>,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,
}

impl ContentConfig {
    /// Parse and validate a configuration document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ContentConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a configuration file, apply environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config: ContentConfig = serde_json::from_str(&raw)?;
        config.apply_env_overrides()?;
        config.validate()?;

        tracing::info!(
            "Loaded configuration from {} ({} collections, {} globals)",
            path.display(),
            config.collections.len(),
            config.globals.len()
        );
        Ok(config)
    }

    /// Path named by `CONTENTFORGE_CONFIG`, if set
    pub fn path_from_env() -> Option<PathBuf> {
        env::var_os(CONFIG_PATH_ENV).map(PathBuf::from)
    }

    /// Apply `CONTENTFORGE_PORT`
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(raw) = env::var(PORT_ENV) {
            self.server.port = raw.trim().parse().map_err(|_| ConfigError::InvalidPort(raw.clone()))?;
        }
        Ok(())
    }

    /// Check cross-entity constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for entity in self.collections.iter().chain(self.globals.iter()) {
            if entity.slug.trim().is_empty() {
                return Err(ConfigError::EmptySlug);
            }
            if RESERVED_SLUGS.contains(&entity.slug.as_str()) {
                return Err(ConfigError::ReservedSlug(entity.slug.clone()));
            }
            if !seen.insert(entity.slug.as_str()) {
                return Err(ConfigError::DuplicateSlug(entity.slug.clone()));
            }
        }

        if let Some(localization) = &self.localization {
            if localization.locales.is_empty() {
                return Err(ConfigError::NoLocales);
            }
            if !localization.has_locale(&localization.default_locale) {
                return Err(ConfigError::UnknownDefaultLocale(localization.default_locale.clone()));
            }
        }

        if self.pagination.default_limit == 0 || self.pagination.max_limit == 0 {
            return Err(ConfigError::InvalidPagination("limits must be greater than 0".to_string()));
        }
        if self.pagination.default_limit > self.pagination.max_limit {
            return Err(ConfigError::InvalidPagination(format!(
                "defaultLimit {} exceeds maxLimit {}",
                self.pagination.default_limit, self.pagination.max_limit
            )));
        }

        Ok(())
    }
}
