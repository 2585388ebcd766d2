//! Host APIs used by the runner and the record providers.
//!
//! - [`cookies`] - Cookie jar scoped to registrable domains
//! - [`http`] - Portal session client (login, form submission)
//! - [`gcloud`] - Google Cloud access tokens
//! - [`firestore`] - Read-only document store client

pub mod cookies;
pub mod firestore;
pub mod gcloud;
pub mod http;

// Re-export key types
pub use cookies::ScopedCookieJar;
pub use firestore::{DocumentStore, FirestoreClient};
pub use gcloud::{AccessToken, GcloudTokenProvider, TokenSource};
pub use http::{PageSummary, PortalSession, SessionClient, CALENDAR_PATH, LOGIN_PATH, REGIST_PATH};
