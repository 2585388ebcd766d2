// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Renraku Fetch
//!
//! Network side of renraku: the portal session, the record providers, and
//! the runner tying them together.
//!
//! ## Host APIs
//!
//! - [`host::http`] - Cookie-keeping session client for the portal
//! - [`host::cookies`] - Public-suffix aware cookie jar
//! - [`host::firestore`] - Save-data document reads
//! - [`host::gcloud`] - Access tokens for the document store
//!
//! ## Providers and Runner
//!
//! - [`strategy::RecordProvider`] - Produces the day's record
//! - [`runner::SubmissionRunner`] - Login, produce, submit
//!
//! ## Example
//!
//! ```ignore
//! use renraku_fetch::{build_provider, SessionClient, SubmissionRunner};
//!
//! let config = Config::from_env()?;
//! let source = config.resolve_source(RecordSource::Auto)?;
//! let provider = build_provider(&config, source)?;
//! let session = SessionClient::from_config(&config)?;
//!
//! let runner = SubmissionRunner::new(&session, provider.as_ref(), &config.credentials, &config.child_id);
//! let report = runner.execute(today_in(config.timezone)).await?;
//! ```

pub mod error;
pub mod host;
pub mod runner;
pub mod strategy;

// Errors
pub use error::{CancelledAt, PortalError, RecordError, RunError, StoreError};

// Host APIs
pub use host::{
    firestore::{DocumentStore, FirestoreClient},
    http::{PageSummary, PortalSession, SessionClient},
};

// Providers & Runner
pub use runner::{RunReport, RunStage, StageRecord, SubmissionRunner};
pub use strategy::{
    build_provider, ProviderKind, RecordProvider, StaticRecordProvider, StoreRecordProvider,
};
