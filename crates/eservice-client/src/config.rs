//! Client configuration loaded from environment variables.
//!
//! All settings have defaults so the client can start with zero
//! configuration.

use std::path::PathBuf;

use eservice_shared::constants::{CHANGE_FEED_CAPACITY, DEFAULT_OPENING_MESSAGE};
use eservice_store::{Database, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Database file location.
    /// Env: `ESERVICE_DB_PATH`
    /// Default: platform data directory (see [`Database::new`]).
    pub database_path: Option<PathBuf>,

    /// Text of the message seeded into every new conversation.
    /// Env: `ESERVICE_OPENING_MESSAGE`
    pub opening_message: String,

    /// Buffered change notifications before a slow live query lags and
    /// falls back to a full re-query.
    /// Env: `ESERVICE_CHANGE_FEED_CAPACITY`
    pub change_feed_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            opening_message: DEFAULT_OPENING_MESSAGE.to_string(),
            change_feed_capacity: CHANGE_FEED_CAPACITY,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(path) = lookup("ESERVICE_DB_PATH") {
            if !path.trim().is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(text) = lookup("ESERVICE_OPENING_MESSAGE") {
            if text.trim().is_empty() {
                tracing::warn!("Empty ESERVICE_OPENING_MESSAGE, using default");
            } else {
                config.opening_message = text;
            }
        }

        if let Some(val) = lookup("ESERVICE_CHANGE_FEED_CAPACITY") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.change_feed_capacity = n,
                _ => tracing::warn!(
                    value = %val,
                    "Invalid ESERVICE_CHANGE_FEED_CAPACITY, using default"
                ),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }

    /// Open the database this configuration points at.
    pub fn open_database(&self) -> Result<Database, StoreError> {
        let db = match &self.database_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "opening database");
                Database::open_at(path)?
            }
            None => Database::new()?,
        };
        Ok(db.with_change_capacity(self.change_feed_capacity))
    }
}
