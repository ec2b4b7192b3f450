//! Durable storage for long-term incident history.
//!
//! Backends persist the whole history on every flush. The store above them
//! decides what to do when a read or write fails.

pub mod json;
pub mod schema;
pub mod sqlite;

use std::error::Error as StdError;

use thiserror::Error;

use crate::config::{StorageBackendKind, StorageConfig};
use crate::detect::IncidentRecord;

pub use self::json::JsonFileBackend;
pub use self::sqlite::SqliteBackend;

type BoxError = Box<dyn StdError + Send + Sync>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage unavailable at {location}: {source}")]
    Unavailable {
        location: String,
        #[source]
        source: BoxError,
    },

    #[error("storage corrupt at {location}: {source}")]
    Corrupt {
        location: String,
        #[source]
        source: BoxError,
    },
}

impl StorageError {
    pub fn unavailable(location: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Unavailable {
            location: location.into(),
            source: source.into(),
        }
    }

    pub fn corrupt(location: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Corrupt {
            location: location.into(),
            source: source.into(),
        }
    }
}

/// Somewhere the full incident history can be read from and written to.
pub trait HistoryBackend: Send + Sync {
    /// Read the stored history. A backend that has never been written to
    /// returns an empty history, not an error.
    fn load(&self) -> Result<Vec<IncidentRecord>, StorageError>;

    /// Replace the stored history with `incidents`.
    fn save(&self, incidents: &[IncidentRecord]) -> Result<(), StorageError>;

    /// Human-readable location for logs.
    fn location(&self) -> String;
}

/// Build the backend selected in configuration.
pub fn open_backend(config: &StorageConfig) -> Result<Box<dyn HistoryBackend>, StorageError> {
    match config.backend {
        StorageBackendKind::Json => Ok(Box::new(JsonFileBackend::new(&config.path))),
        StorageBackendKind::Sqlite => Ok(Box::new(SqliteBackend::open(&config.path)?)),
    }
}
