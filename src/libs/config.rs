//! Connection and schema configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::libs::error::{OrmError, Result};
use crate::libs::schema::Schema;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 3;

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

fn default_acquire_timeout_secs() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT_SECS
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatabaseConfig {
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_secs: DEFAULT_ACQUIRE_TIMEOUT_SECS,
        }
    }

    /// Reads `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and
    /// `DATABASE_ACQUIRE_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| OrmError::Config("DATABASE_URL is not set".to_string()))?;
        let mut config = Self::new(database_url);
        if let Some(raw) = lookup("DATABASE_MAX_CONNECTIONS") {
            config.max_connections = raw.parse().map_err(|_| {
                OrmError::Config(format!("DATABASE_MAX_CONNECTIONS is not a number: {raw}"))
            })?;
        }
        if let Some(raw) = lookup("DATABASE_ACQUIRE_TIMEOUT_SECS") {
            config.acquire_timeout_secs = raw.parse().map_err(|_| {
                OrmError::Config(format!("DATABASE_ACQUIRE_TIMEOUT_SECS is not a number: {raw}"))
            })?;
        }
        Ok(config)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

/// Database settings plus the tables to keep in sync, as loaded from TOML.
///
/// ```toml
/// [database]
/// database_url = "postgres://postgres@localhost:5432/postgres"
///
/// [[tables]]
/// name = "users"
/// fields = [
///     { name = "id", kind = "number", primary_key = true },
///     { name = "name", kind = "string", not_null = true },
/// ]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub tables: Schema,
}

impl SyncConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| OrmError::Config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| OrmError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }
}
