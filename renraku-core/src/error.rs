//! Core error types for `renraku`.

use thiserror::Error;

/// Core error type for record handling.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The raw temperature is not `<digits>.<digits>`.
    #[error("Malformed temperature {0:?}: expected one '.' between two digit groups")]
    MalformedTemperature(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while validating configuration.
///
/// Every variant is produced before any component is constructed, so a bad
/// environment never reaches the network.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{0} env var must be defined")]
    Missing(&'static str),

    /// Only part of the document store location was provided.
    #[error("Incomplete save-data location: {missing} is not set (needs PROJECT_ID, SAVE_DATA_COLLECTION and SAVE_DATA_DOCUMENT together)")]
    IncompleteStoreLocation {
        /// First missing variable of the group.
        missing: &'static str,
    },

    /// The store source was requested but no location is configured.
    #[error("Record source 'store' requires PROJECT_ID, SAVE_DATA_COLLECTION and SAVE_DATA_DOCUMENT")]
    StoreNotConfigured,

    /// A variable is set but its value cannot be used.
    #[error("Invalid value for {name}: {reason}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
