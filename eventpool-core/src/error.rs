//! Error types for the event pool core library.

use thiserror::Error;

/// Top-level error type for all event pool operations.
///
/// Unknown turns and choices are not errors: lookups return `None` or an
/// empty list instead.
#[derive(Error, Debug)]
pub enum EventPoolError {
    /// The backing catalog could not be read. Fatal at startup.
    #[error("Catalog fetch failed: {0}")]
    Catalog(String),

    /// The loaded catalog failed integrity validation. Fatal at startup.
    #[error("Event pool validation failed:\n{}", errors.join("\n"))]
    Validation {
        /// Every failed check, in the order it was detected.
        errors: Vec<String>,
    },

    /// An operation that needs a validated pool ran before startup finished.
    #[error("Event pool not loaded yet")]
    NotReady,

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, EventPoolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_every_error() {
        let err = EventPoolError::Validation {
            errors: vec![
                "No choices found for turn 1".to_string(),
                "Found 2 orphaned choices".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Event pool validation failed:"));
        assert!(msg.contains("No choices found for turn 1"));
        assert!(msg.contains("Found 2 orphaned choices"));
    }
}
