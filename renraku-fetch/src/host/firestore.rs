//! Read-only Firestore REST client for the save-data document.
//!
//! Only single-document reads are supported. Record fields are flattened to
//! strings: `stringValue` as-is, `integerValue` and `doubleValue` in their
//! text form, `nullValue` as empty. Any other value kind on a record field
//! is a shape mismatch. Fields the record does not have are skipped.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use renraku_core::{Config, StoreLocation, FIELD_NAMES};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use super::gcloud::GcloudTokenProvider;
use crate::error::StoreError;

/// Firestore REST API base URL.
const FIRESTORE_API_BASE: &str = "https://firestore.googleapis.com/v1/";

/// Token the emulator accepts in place of a real one.
const EMULATOR_TOKEN: &str = "owner";

/// Longest error body kept for diagnostics.
const MAX_ERROR_BODY: usize = 512;

// ============================================================================
// Document Store Trait
// ============================================================================

/// Single-document reads from a key-value document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches the document at `location` as a flat field → string map.
    async fn get_document(
        &self,
        location: &StoreLocation,
    ) -> Result<BTreeMap<String, String>, StoreError>;
}

// ============================================================================
// Firestore Client
// ============================================================================

#[derive(Debug, Deserialize)]
struct Document {
    #[serde(default)]
    fields: BTreeMap<String, Value>,
}

/// Firestore client over the REST API.
#[derive(Debug, Clone)]
pub struct FirestoreClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Option<GcloudTokenProvider>,
}

impl FirestoreClient {
    /// Creates a client for production Firestore.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, StoreError> {
        let http = build_http(timeout)?;
        let base_url = Url::parse(FIRESTORE_API_BASE)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self {
            tokens: Some(GcloudTokenProvider::new(http.clone())),
            http,
            base_url,
        })
    }

    /// Creates a client for the local emulator at `host` (`host:port`).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` if `host` does not form a valid URL.
    pub fn emulator(host: &str, timeout: Duration) -> Result<Self, StoreError> {
        let base_url = Url::parse(&format!("http://{host}/v1/"))
            .map_err(|e| StoreError::Unavailable(format!("bad emulator host '{host}': {e}")))?;

        Ok(Self {
            http: build_http(timeout)?,
            base_url,
            tokens: None,
        })
    }

    /// Creates a client for the configured store or emulator.
    ///
    /// # Errors
    ///
    /// See [`FirestoreClient::new`] and [`FirestoreClient::emulator`].
    pub fn from_config(config: &Config) -> Result<Self, StoreError> {
        match &config.store_emulator_host {
            Some(host) => Self::emulator(host, config.request_timeout),
            None => Self::new(config.request_timeout),
        }
    }

    /// Builds the REST URL of the document at `location`.
    fn document_url(&self, location: &StoreLocation) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Unavailable("base URL cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend([
                "projects",
                location.project_id.as_str(),
                "databases",
                "(default)",
                "documents",
                location.collection.as_str(),
                location.document.as_str(),
            ]);
        Ok(url)
    }
}

#[async_trait]
impl DocumentStore for FirestoreClient {
    #[instrument(skip(self), fields(collection = %location.collection, document = %location.document))]
    async fn get_document(
        &self,
        location: &StoreLocation,
    ) -> Result<BTreeMap<String, String>, StoreError> {
        let url = self.document_url(location)?;

        let token = match &self.tokens {
            Some(tokens) => tokens.load().await?.token,
            None => EMULATOR_TOKEN.to_string(),
        };

        debug!(url = %url, "GET document");
        let response = self.http.get(url).bearer_auth(token).send().await?;
        let status = response.status();
        info!(status = %status, "Document store response received");

        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound {
                collection: location.collection.clone(),
                document: location.document.clone(),
            });
        }

        let body = response.text().await?;
        if !status.is_success() {
            let mut body = body;
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            return Err(StoreError::Unavailable(format!("HTTP {status}: {body}")));
        }

        decode_document(&body)
    }
}

fn build_http(timeout: Duration) -> Result<reqwest::Client, StoreError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("renraku/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| StoreError::Unavailable(format!("failed to build HTTP client: {e}")))
}

// ============================================================================
// Decoding
// ============================================================================

/// Flattens the record fields of a Firestore document body into
/// field → string.
fn decode_document(body: &str) -> Result<BTreeMap<String, String>, StoreError> {
    let document: Document =
        serde_json::from_str(body).map_err(|e| StoreError::Decode(e.to_string()))?;

    let (known, skipped): (Vec<_>, Vec<_>) = document
        .fields
        .iter()
        .partition(|(name, _)| FIELD_NAMES.contains(&name.as_str()));

    if !skipped.is_empty() {
        let names: Vec<&str> = skipped.iter().map(|(name, _)| name.as_str()).collect();
        debug!(fields = ?names, "Skipping fields outside the record");
    }

    known
        .into_iter()
        .map(|(name, value)| Ok((name.clone(), decode_value(name, value)?)))
        .collect()
}

/// Converts one typed Firestore value to a string.
fn decode_value(name: &str, value: &Value) -> Result<String, StoreError> {
    let mismatch = |kind: &str| {
        StoreError::Decode(format!("field '{name}' has unsupported type {kind}"))
    };

    let Some(object) = value.as_object() else {
        return Err(mismatch("(not a typed value)"));
    };

    if let Some(v) = object.get("stringValue") {
        return v.as_str().map(str::to_string).ok_or_else(|| mismatch("stringValue"));
    }
    if let Some(v) = object.get("integerValue") {
        // int64 values are sent as JSON strings.
        return match v {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            _ => Err(mismatch("integerValue")),
        };
    }
    if let Some(v) = object.get("doubleValue") {
        return match v {
            Value::Number(n) => Ok(n.to_string()),
            Value::String(s) => Ok(s.clone()),
            _ => Err(mismatch("doubleValue")),
        };
    }
    if object.contains_key("nullValue") {
        return Ok(String::new());
    }

    let kind = object.keys().next().map_or("(empty)", String::as_str);
    Err(mismatch(kind))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::http::{header, HeaderMap, Uri};
    use axum::Router;

    use super::*;

    fn location() -> StoreLocation {
        StoreLocation {
            project_id: "web-sakura".to_string(),
            collection: "save-data".to_string(),
            document: "default".to_string(),
        }
    }

    #[test]
    fn test_document_url() {
        let client = FirestoreClient::new(Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.document_url(&location()).unwrap().as_str(),
            "https://firestore.googleapis.com/v1/projects/web-sakura/databases/(default)/documents/save-data/default"
        );
    }

    #[test]
    fn test_emulator_url() {
        let client = FirestoreClient::emulator("localhost:8686", Duration::from_secs(5)).unwrap();
        assert!(client.tokens.is_none());
        assert_eq!(
            client.document_url(&location()).unwrap().as_str(),
            "http://localhost:8686/v1/projects/web-sakura/databases/(default)/documents/save-data/default"
        );
    }

    #[test]
    fn test_document_url_escapes_ids() {
        let client = FirestoreClient::new(Duration::from_secs(5)).unwrap();
        let mut loc = location();
        loc.document = "a/b c".to_string();
        let url = client.document_url(&loc).unwrap();
        assert!(url.as_str().ends_with("/save-data/a%2Fb%20c"));
    }

    #[test]
    fn test_decode_document() {
        let body = r#"{
            "name": "projects/web-sakura/databases/(default)/documents/save-data/default",
            "fields": {
                "dinner_comment": {"stringValue": "食べました。"},
                "defecation_morning_count": {"integerValue": "1"},
                "thermometry": {"doubleValue": 36.7}
            },
            "createTime": "2023-03-01T00:00:00Z",
            "updateTime": "2023-03-01T00:00:00Z"
        }"#;

        let fields = decode_document(body).unwrap();
        assert_eq!(fields["dinner_comment"], "食べました。");
        assert_eq!(fields["defecation_morning_count"], "1");
        assert_eq!(fields["thermometry"], "36.7");
    }

    #[test]
    fn test_decode_document_without_fields() {
        let fields = decode_document(r#"{"name": "x"}"#).unwrap();
        assert!(fields.is_empty());
    }

    #[test]
    fn test_decode_rejects_other_types() {
        let body = r#"{"fields": {"swimming": {"booleanValue": true}}}"#;
        let err = decode_document(body).unwrap_err();
        assert!(matches!(err, StoreError::Decode(msg) if msg.contains("booleanValue")));

        let body = r#"{"fields": {"message": {"mapValue": {"fields": {}}}}}"#;
        assert!(decode_document(body).is_err());
    }

    #[test]
    fn test_decode_skips_fields_outside_the_record() {
        let body = r#"{"fields": {
            "thermometry": {"stringValue": "36.7"},
            "enabled": {"booleanValue": true},
            "updated": {"timestampValue": "2023-03-01T00:00:00Z"}
        }}"#;

        let fields = decode_document(body).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["thermometry"], "36.7");
    }

    #[test]
    fn test_decode_null_is_empty() {
        let body = r#"{"fields": {"message": {"nullValue": null}}}"#;

        let fields = decode_document(body).unwrap();
        assert_eq!(fields["message"], "");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_document("<html>"),
            Err(StoreError::Decode(_))
        ));
    }

    // ========================================================================
    // Local Emulator
    // ========================================================================

    /// Serves one canned answer for every path; returns the client and the
    /// `(path, authorization)` of each request seen.
    async fn emulator_answering(
        status: StatusCode,
        body: &'static str,
    ) -> (FirestoreClient, Arc<Mutex<Vec<(String, String)>>>) {
        let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::default();
        let captured = seen.clone();

        let router = Router::new().fallback(move |uri: Uri, headers: HeaderMap| async move {
            let auth = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            captured.lock().unwrap().push((uri.path().to_string(), auth));
            (status, body)
        });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client = FirestoreClient::emulator(&addr.to_string(), Duration::from_secs(5)).unwrap();
        (client, seen)
    }

    #[tokio::test]
    async fn test_get_document_from_emulator() {
        let (client, seen) = emulator_answering(
            StatusCode::OK,
            r#"{"fields": {"thermometry": {"stringValue": "36.9"}, "enabled": {"booleanValue": true}}}"#,
        )
        .await;

        let fields = client.get_document(&location()).await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["thermometry"], "36.9");

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen[0].0,
            "/v1/projects/web-sakura/databases/(default)/documents/save-data/default"
        );
        assert_eq!(seen[0].1, "Bearer owner");
    }

    #[tokio::test]
    async fn test_missing_document_is_not_found() {
        let (client, _) = emulator_answering(StatusCode::NOT_FOUND, "{}").await;

        let err = client.get_document(&location()).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::NotFound { collection, document }
                if collection == "save-data" && document == "default"
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_unavailable() {
        let (client, _) = emulator_answering(StatusCode::INTERNAL_SERVER_ERROR, "backend down").await;

        let err = client.get_document(&location()).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Unavailable(msg) if msg.contains("500") && msg.contains("backend down")
        ));
    }
}
