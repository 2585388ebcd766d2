//! Configuration loaded from the environment.
//!
//! All values are read and validated in one step by [`Config::from_env`],
//! before any HTTP client or store client exists. Tests use
//! [`Config::from_lookup`] with a map instead of mutating the process
//! environment.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use url::Url;

use crate::error::ConfigError;
use crate::models::DEFAULT_TIMEZONE;

/// Portal the records are submitted to.
pub const DEFAULT_PORTAL_BASE_URL: &str = "https://parents.cloud-sakura.net";

/// Default per-request HTTP timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// Variable names.
const ACCOUNT: &str = "ACCOUNT";
const PASSWORD: &str = "PASSWORD";
const CHILD_ID: &str = "CHILD_ID";
const PROJECT_ID: &str = "PROJECT_ID";
const SAVE_DATA_COLLECTION: &str = "SAVE_DATA_COLLECTION";
const SAVE_DATA_DOCUMENT: &str = "SAVE_DATA_DOCUMENT";
const PORTAL_BASE_URL: &str = "PORTAL_BASE_URL";
const TIMEZONE: &str = "RENRAKU_TIMEZONE";
const TIMEOUT_SECS: &str = "RENRAKU_TIMEOUT_SECS";
const FIRESTORE_EMULATOR_HOST: &str = "FIRESTORE_EMULATOR_HOST";

// ============================================================================
// Credentials
// ============================================================================

/// Portal login credentials. Held for one run and never written anywhere.
#[derive(Clone)]
pub struct Credentials {
    /// Login account.
    pub account: String,
    password: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            password: password.into(),
        }
    }

    /// Returns the password.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("password", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Record Source
// ============================================================================

/// Location of the save-data document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocation {
    /// Cloud project that owns the document database.
    pub project_id: String,
    /// Collection holding the save-data document.
    pub collection: String,
    /// Document ID.
    pub document: String,
}

/// Which record provider a run uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordSource {
    /// Use the store when a location is configured, static defaults otherwise.
    #[default]
    Auto,
    /// Always use the static defaults.
    Static,
    /// Always use the document store.
    Store,
}

impl RecordSource {
    /// Returns the lowercase name used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Static => "static",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for RecordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordSource {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "static" => Ok(Self::Static),
            "store" => Ok(Self::Store),
            other => Err(ConfigError::Invalid {
                name: "source",
                reason: format!("unknown record source '{other}'"),
            }),
        }
    }
}

/// A record source after checking it against the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedSource<'a> {
    /// Static defaults.
    Static,
    /// Document at the given location.
    Store(&'a StoreLocation),
}

// ============================================================================
// Config
// ============================================================================

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Portal login.
    pub credentials: Credentials,
    /// Child the entries are registered for.
    pub child_id: String,
    /// Save-data document location, if the store source is configured.
    pub store: Option<StoreLocation>,
    /// Scheme and host of the portal.
    pub portal_base_url: Url,
    /// Zone used to compute the entry date.
    pub timezone: Tz,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Document store emulator (`host:port`), bypasses authentication.
    pub store_emulator_host: Option<String>,
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first missing or invalid variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first missing or invalid variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        let credentials = Credentials::new(required(ACCOUNT)?, required(PASSWORD)?);
        let child_id = required(CHILD_ID)?;

        let store = match (
            get(PROJECT_ID),
            get(SAVE_DATA_COLLECTION),
            get(SAVE_DATA_DOCUMENT),
        ) {
            (None, None, None) => None,
            (Some(project_id), Some(collection), Some(document)) => Some(StoreLocation {
                project_id,
                collection,
                document,
            }),
            (project, collection, _) => {
                let missing = if project.is_none() {
                    PROJECT_ID
                } else if collection.is_none() {
                    SAVE_DATA_COLLECTION
                } else {
                    SAVE_DATA_DOCUMENT
                };
                return Err(ConfigError::IncompleteStoreLocation { missing });
            }
        };

        let raw_url = get(PORTAL_BASE_URL).unwrap_or_else(|| DEFAULT_PORTAL_BASE_URL.to_string());
        let portal_base_url = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            name: PORTAL_BASE_URL,
            reason: e.to_string(),
        })?;
        if !matches!(portal_base_url.scheme(), "https" | "http") {
            return Err(ConfigError::Invalid {
                name: PORTAL_BASE_URL,
                reason: format!("unsupported scheme '{}'", portal_base_url.scheme()),
            });
        }

        let timezone = match get(TIMEZONE) {
            Some(name) => name.parse::<Tz>().map_err(|e| ConfigError::Invalid {
                name: TIMEZONE,
                reason: e.to_string(),
            })?,
            None => DEFAULT_TIMEZONE,
        };

        let timeout_secs = match get(TIMEOUT_SECS) {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| ConfigError::Invalid {
                    name: TIMEOUT_SECS,
                    reason: format!("expected a positive number of seconds, got '{raw}'"),
                })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            credentials,
            child_id,
            store,
            portal_base_url,
            timezone,
            request_timeout: Duration::from_secs(timeout_secs),
            store_emulator_host: get(FIRESTORE_EMULATOR_HOST),
        })
    }

    /// Checks `source` against the configured store location.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::StoreNotConfigured` when `Store` is requested
    /// without a location.
    pub fn resolve_source(&self, source: RecordSource) -> Result<ResolvedSource<'_>, ConfigError> {
        match (source, &self.store) {
            (RecordSource::Static, _) | (RecordSource::Auto, None) => Ok(ResolvedSource::Static),
            (RecordSource::Auto | RecordSource::Store, Some(location)) => {
                Ok(ResolvedSource::Store(location))
            }
            (RecordSource::Store, None) => Err(ConfigError::StoreNotConfigured),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
