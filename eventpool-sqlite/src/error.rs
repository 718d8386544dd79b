//! SQLite catalog error types.

use thiserror::Error;

use eventpool_core::EventPoolError;

/// Errors raised while reading or seeding the SQLite catalog.
#[derive(Debug, Error)]
pub enum SqliteCatalogError {
    /// SQLite rejected a statement or the database could not be opened.
    #[error("SQLite error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A stored `effects` column was not valid effect JSON.
    #[error("Malformed effects for choice {choice_id}: {source}")]
    Effects {
        /// Offending row.
        choice_id: u32,
        /// Decoder error.
        source: serde_json::Error,
    },

    /// Effects could not be encoded during import.
    #[error("Failed to encode effects: {0}")]
    Encode(#[from] serde_json::Error),

    /// The blocking read task panicked or was cancelled.
    #[error("Catalog read task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<SqliteCatalogError> for EventPoolError {
    fn from(err: SqliteCatalogError) -> Self {
        EventPoolError::Catalog(err.to_string())
    }
}
