//! Google Cloud access tokens for the document store.
//!
//! ## Credential Sources
//!
//! 1. **Instance metadata server**
//!    - Available inside the cloud function runtime
//!    - Returns a token for the runtime's service account
//!
//! 2. **Application Default Credentials (ADC)**
//!    - `GOOGLE_APPLICATION_CREDENTIALS`, or
//!    - `~/.config/gcloud/application_default_credentials.json`
//!    - Refresh token exchanged for an access token
//!
//! 3. **gcloud CLI**
//!    - `gcloud auth print-access-token`

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::StoreError;

// ============================================================================
// Constants
// ============================================================================

/// Google OAuth token endpoint.
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Metadata server token endpoint for the default service account.
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// The metadata server answers quickly or not at all.
const METADATA_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// Credential Types
// ============================================================================

/// Application Default Credentials file format (user credentials).
#[derive(Debug, Deserialize)]
pub struct AdcCredentials {
    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: String,

    /// Refresh token for obtaining new access tokens.
    pub refresh_token: String,

    /// Credential type (usually "authorized_user").
    #[serde(rename = "type")]
    pub cred_type: String,
}

/// Token response from Google OAuth and from the metadata server.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Where a token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Instance metadata server.
    Metadata,
    /// Refreshed application default credentials.
    Adc,
    /// `gcloud auth print-access-token`.
    Cli,
}

/// An OAuth access token.
#[derive(Clone)]
pub struct AccessToken {
    /// The bearer token.
    pub token: String,
    /// Where it came from.
    pub source: TokenSource,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

// ============================================================================
// Token Provider
// ============================================================================

/// Obtains access tokens for Google Cloud APIs.
#[derive(Debug, Clone)]
pub struct GcloudTokenProvider {
    http: reqwest::Client,
}

impl GcloudTokenProvider {
    /// Creates a provider that uses `http` for token requests.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Loads an access token from the first source that works.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoCredentials` if every source fails.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<AccessToken, StoreError> {
        let mut failures = Vec::new();

        match self.metadata_token().await {
            Ok(token) => {
                debug!(source = "metadata", "Got token from metadata server");
                return Ok(token);
            }
            Err(e) => failures.push(format!("metadata: {e}")),
        }

        match self.adc_token().await {
            Ok(token) => {
                debug!(source = "adc", "Got token from ADC refresh");
                return Ok(token);
            }
            Err(e) => failures.push(format!("adc: {e}")),
        }

        match Self::cli_token().await {
            Ok(token) => {
                debug!(source = "cli", "Got token from gcloud CLI");
                return Ok(token);
            }
            Err(e) => failures.push(format!("cli: {e}")),
        }

        Err(StoreError::NoCredentials(failures.join("; ")))
    }

    /// Asks the instance metadata server for a service account token.
    async fn metadata_token(&self) -> Result<AccessToken, StoreError> {
        let response = self
            .http
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .timeout(METADATA_TIMEOUT)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(StoreError::NoCredentials(format!(
                "metadata server returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StoreError::NoCredentials(format!("bad metadata token: {e}")))?;

        Ok(AccessToken {
            token: token.access_token,
            source: TokenSource::Metadata,
        })
    }

    /// Reads the ADC file and exchanges its refresh token.
    async fn adc_token(&self) -> Result<AccessToken, StoreError> {
        let path = adc_path()
            .ok_or_else(|| StoreError::NoCredentials("no ADC path".to_string()))?;

        let content = std::fs::read_to_string(&path).map_err(|e| {
            StoreError::NoCredentials(format!("{}: {e}", path.display()))
        })?;

        let adc = parse_adc(&content)?;
        self.refresh(&adc).await
    }

    /// Exchanges a refresh token for an access token.
    async fn refresh(&self, adc: &AdcCredentials) -> Result<AccessToken, StoreError> {
        debug!("Refreshing access token");

        let params = [
            ("client_id", adc.client_id.as_str()),
            ("client_secret", adc.client_secret.as_str()),
            ("refresh_token", adc.refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self.http.post(GOOGLE_TOKEN_URL).form(&params).send().await?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::RefreshFailed(body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StoreError::RefreshFailed(format!("token response parse error: {e}")))?;

        Ok(AccessToken {
            token: token.access_token,
            source: TokenSource::Adc,
        })
    }

    /// Runs `gcloud auth print-access-token`.
    async fn cli_token() -> Result<AccessToken, StoreError> {
        if which::which("gcloud").is_err() {
            return Err(StoreError::NoCredentials("gcloud CLI not found".to_string()));
        }

        let output = tokio::process::Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .output()
            .await
            .map_err(|e| StoreError::NoCredentials(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StoreError::NoCredentials(stderr.trim().to_string()));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(StoreError::NoCredentials("empty token".to_string()));
        }

        Ok(AccessToken {
            token,
            source: TokenSource::Cli,
        })
    }
}

/// Parses an ADC file, accepting only user credentials.
fn parse_adc(content: &str) -> Result<AdcCredentials, StoreError> {
    let adc: AdcCredentials = serde_json::from_str(content)
        .map_err(|e| StoreError::NoCredentials(format!("unsupported ADC file: {e}")))?;

    if adc.cred_type != "authorized_user" {
        return Err(StoreError::NoCredentials(format!(
            "unsupported ADC type '{}'",
            adc.cred_type
        )));
    }

    Ok(adc)
}

/// Returns the ADC file path.
pub fn adc_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
        return Some(PathBuf::from(path));
    }

    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("gcloud").join("application_default_credentials.json"))
}

// ============================================================================
// Tests
// ============================================================================
