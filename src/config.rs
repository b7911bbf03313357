use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::StoreError;

/// Primary env var for the connection string.
pub const DATABASE_URL_ENV: &str = "MAILCATCHER_DATABASE_URL";

/// Fallback env var, shared with other tooling.
pub const LEGACY_DATABASE_URL_ENV: &str = "DATABASE_URL";

pub const NOTIFY_CAPACITY_ENV: &str = "MAILCATCHER_NOTIFY_CAPACITY";

pub const DEFAULT_NOTIFY_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Store config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    pub database_url: String,
    /// Buffered notifications per subscriber before it starts lagging.
    #[serde(default = "default_notify_capacity")]
    pub notify_capacity: usize,
}

fn default_notify_capacity() -> usize {
    DEFAULT_NOTIFY_CAPACITY
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            notify_capacity: DEFAULT_NOTIFY_CAPACITY,
        }
    }
}

/// Where the connection string points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Memory,
    File(PathBuf),
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Self::default()
        }
    }

    pub fn in_memory() -> Self {
        Self::new(":memory:")
    }

    /// Resolve from env vars, falling back to the per-user data dir.
    pub fn from_env() -> Self {
        let database_url = std::env::var(DATABASE_URL_ENV)
            .or_else(|_| std::env::var(LEGACY_DATABASE_URL_ENV))
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(default_database_url);
        let notify_capacity = std::env::var(NOTIFY_CAPACITY_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_NOTIFY_CAPACITY);

        StoreConfig {
            database_url,
            notify_capacity,
        }
    }

    /// Parse `database_url` into something `rusqlite` can open.
    pub fn target(&self) -> Result<DatabaseTarget, StoreError> {
        let url = self.database_url.trim();
        if url.is_empty() {
            return Err(StoreError::Config("empty database url".into()));
        }

        let rest = if let Some(rest) = url.strip_prefix("sqlite://") {
            rest
        } else if let Some(rest) = url.strip_prefix("sqlite:") {
            rest
        } else if let Some((scheme, _)) = url.split_once("://") {
            return Err(StoreError::Config(format!(
                "unsupported database scheme '{scheme}'"
            )));
        } else {
            url
        };

        let path = rest.split_once('?').map(|(p, _)| p).unwrap_or(rest);
        match path {
            "" => Err(StoreError::Config(format!("no database path in '{url}'"))),
            ":memory:" => Ok(DatabaseTarget::Memory),
            p => Ok(DatabaseTarget::File(PathBuf::from(p))),
        }
    }
}

fn default_database_url() -> String {
    let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    let path = base.join("mailcatcher").join("mailcatcher.db");
    format!("sqlite://{}", path.display())
}
