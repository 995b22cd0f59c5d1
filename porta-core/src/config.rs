//! Database connection configuration.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::DbError;

/// Connection settings plus the per-installation tables some portability
/// directives consult. Deserializable from TOML; all connection fields are
/// optional so site config can be partial.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DbConfig {
    /// Backend identifier, e.g. "postgres", "oracle", "sqlite".
    pub backend: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Read the password from this file when `password` is unset.
    pub password_file: Option<String>,
    /// Database name, service name, or file path depending on backend.
    pub database: Option<String>,
    /// Schema qualifying tables and sequences in portability directives.
    pub schema: Option<String>,
    /// Max entries per cursor's statement-translation cache.
    pub sql_cache_size: Option<usize>,
    /// String values resolvable through `[:get_config var=...]`.
    #[serde(default)]
    pub config: BTreeMap<String, String>,
    /// Integer constants resolvable through `[:get_constant name=...]`.
    #[serde(default)]
    pub constants: BTreeMap<String, i64>,
}

impl DbConfig {
    /// A minimal config for the given backend.
    pub fn new(backend: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, DbError> {
        toml::from_str(text)
            .map_err(|e| DbError::interface(format!("invalid database config: {e}")))
    }

    pub fn from_path(path: &Path) -> Result<Self, DbError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DbError::interface(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Returns the effective translation-cache size, defaulting to 100.
    pub fn effective_sql_cache_size(&self) -> usize {
        self.sql_cache_size.unwrap_or(100)
    }

    /// The schema for directive expansion: configured schema, else the
    /// connecting user (Oracle convention), else "public".
    pub fn effective_schema(&self) -> &str {
        self.schema
            .as_deref()
            .or(self.user.as_deref())
            .unwrap_or("public")
    }

    /// The inline password if set, else the trimmed contents of
    /// `password_file`, else None.
    pub fn resolve_password(&self) -> Result<Option<String>, DbError> {
        if self.password.is_some() {
            return Ok(self.password.clone());
        }
        match &self.password_file {
            None => Ok(None),
            Some(file) => {
                let text = std::fs::read_to_string(file).map_err(|e| {
                    DbError::interface(format!("cannot read password file {file}: {e}"))
                })?;
                Ok(Some(text.trim_end_matches(['\r', '\n']).to_owned()))
            }
        }
    }
}
