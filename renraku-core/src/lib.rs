// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # renraku Core
//!
//! Record model and configuration for the `renraku` contact-book
//! auto-registration tool.
//!
//! ## Key Types
//!
//! - [`SubmissionRecord`] - One day's entry, encoded as the save-data blob
//! - [`SubmissionForm`] - The `save_data` + `child_id` form
//! - [`Config`] - Validated environment configuration
//! - [`Credentials`] - Portal login (password redacted in `Debug`)
//! - [`RecordSource`] - Static defaults or the document store

pub mod config;
pub mod error;
pub mod models;

// Re-export error types
pub use error::{ConfigError, CoreError};

// Re-export configuration
pub use config::{Config, Credentials, RecordSource, ResolvedSource, StoreLocation};

// Re-export model types
pub use models::{
    date_in, split_temperature, today_in, SubmissionForm, SubmissionRecord, DEFAULT_TIMEZONE,
    DERIVED_FIELDS, FIELD_NAMES,
};
