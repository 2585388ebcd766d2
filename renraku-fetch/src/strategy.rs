//! Record provider trait and strategies.
//!
//! A provider produces the finished record for one date. Two strategies
//! exist: fixed defaults, and a document read from the document store.
//! Both end in [`SubmissionRecord::finalize`], so date and temperature
//! handling is identical regardless of where the values came from.

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use renraku_core::{Config, ResolvedSource, StoreLocation, SubmissionRecord};
use tracing::{debug, info, instrument, warn};

use crate::error::{RecordError, StoreError};
use crate::host::firestore::{DocumentStore, FirestoreClient};

// ============================================================================
// Provider Kind
// ============================================================================

/// Where a provider takes its values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Built-in defaults.
    Static,
    /// Document store.
    Store,
}

impl ProviderKind {
    /// Returns the display name for this kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Static => "Static defaults",
            Self::Store => "Document store",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Record Provider Trait
// ============================================================================

/// Produces the submission record for a given date.
///
/// ## Implementing a Provider
///
/// ```ignore
/// struct FixedProvider(SubmissionRecord);
///
/// #[async_trait]
/// impl RecordProvider for FixedProvider {
///     fn id(&self) -> &str {
///         "fixed"
///     }
///
///     fn kind(&self) -> ProviderKind {
///         ProviderKind::Static
///     }
///
///     async fn produce(&self, date: NaiveDate) -> Result<SubmissionRecord, RecordError> {
///         Ok(self.0.clone().finalize(date)?)
///     }
/// }
/// ```
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// Identifier used in logs (e.g. `"static"`, `"store"`).
    fn id(&self) -> &str;

    /// Where the values come from.
    fn kind(&self) -> ProviderKind;

    /// Produces the finalized record for `date`.
    ///
    /// The returned record has every field set and the temperature split.
    async fn produce(&self, date: NaiveDate) -> Result<SubmissionRecord, RecordError>;
}

// ============================================================================
// Static Provider
// ============================================================================

/// Provider returning fixed defaults with the date applied.
#[derive(Debug, Clone)]
pub struct StaticRecordProvider {
    defaults: SubmissionRecord,
}

impl StaticRecordProvider {
    /// Creates a provider over [`SubmissionRecord::static_defaults`].
    pub fn new() -> Self {
        Self::with_defaults(SubmissionRecord::static_defaults())
    }

    /// Creates a provider over custom defaults.
    pub fn with_defaults(defaults: SubmissionRecord) -> Self {
        Self { defaults }
    }
}

impl Default for StaticRecordProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordProvider for StaticRecordProvider {
    fn id(&self) -> &str {
        "static"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Static
    }

    async fn produce(&self, date: NaiveDate) -> Result<SubmissionRecord, RecordError> {
        debug!(%date, "Using static defaults");
        Ok(self.defaults.clone().finalize(date)?)
    }
}

// ============================================================================
// Store Provider
// ============================================================================

/// Provider reading the record from one stored document.
pub struct StoreRecordProvider<S = FirestoreClient> {
    store: S,
    location: StoreLocation,
}

impl<S: DocumentStore> StoreRecordProvider<S> {
    /// Creates a provider reading `location` from `store`.
    pub fn new(store: S, location: StoreLocation) -> Self {
        Self { store, location }
    }

    /// Returns the document location.
    pub fn location(&self) -> &StoreLocation {
        &self.location
    }
}

#[async_trait]
impl<S: DocumentStore> RecordProvider for StoreRecordProvider<S> {
    fn id(&self) -> &str {
        "store"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Store
    }

    #[instrument(skip(self), fields(collection = %self.location.collection, document = %self.location.document))]
    async fn produce(&self, date: NaiveDate) -> Result<SubmissionRecord, RecordError> {
        let fields = self.store.get_document(&self.location).await?;
        info!(fields = fields.len(), "Fetched save-data document");

        let (record, missing) = SubmissionRecord::from_fields(&fields)?;
        if !missing.is_empty() {
            warn!(missing = ?missing, "Document lacks fields, submitting them empty");
        }

        Ok(record.finalize(date)?)
    }
}

// ============================================================================
// Provider Selection
// ============================================================================

/// Builds the provider for an already resolved source.
///
/// # Errors
///
/// Returns `StoreError` if the document store client cannot be created.
pub fn build_provider(
    config: &Config,
    source: ResolvedSource<'_>,
) -> Result<Box<dyn RecordProvider>, StoreError> {
    match source {
        ResolvedSource::Static => Ok(Box::new(StaticRecordProvider::new())),
        ResolvedSource::Store(location) => {
            let client = FirestoreClient::from_config(config)?;
            Ok(Box::new(StoreRecordProvider::new(client, location.clone())))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
