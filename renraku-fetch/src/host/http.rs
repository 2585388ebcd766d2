//! Cookie-keeping HTTP session against the parents portal.
//!
//! One [`SessionClient`] owns one cookie jar. Login stores the portal's
//! session cookie in it and every later request on the same client sends it
//! back, mirroring how a browser session works on the site.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use renraku_core::{Config, Credentials};
use reqwest::{header, header::HeaderMap, Client, Response, StatusCode};
use tracing::{debug, info, instrument};
use url::Url;

use super::cookies::ScopedCookieJar;
use crate::error::PortalError;

/// Login form endpoint.
pub const LOGIN_PATH: &str = "/pages/accounts/login.php";

/// Contact-book registration endpoint.
pub const REGIST_PATH: &str = "/pages/contact-book/regist-api.php";

/// Calendar page, only reachable with a valid session.
pub const CALENDAR_PATH: &str = "/pages/calendar/index.php";

/// User agent string for renraku.
const USER_AGENT: &str = concat!("renraku/", env!("CARGO_PKG_VERSION"));

/// Longest error body kept for diagnostics.
const MAX_ERROR_BODY: usize = 512;

// ============================================================================
// Portal Session Trait
// ============================================================================

/// Authenticated form exchanges with the portal.
///
/// Implementations must keep whatever session state `login` establishes and
/// present it on `submit`.
#[async_trait]
pub trait PortalSession: Send + Sync {
    /// Posts the login form. Success means any 2xx or 3xx answer.
    async fn login(&self, credentials: &Credentials) -> Result<(), PortalError>;

    /// Posts `fields` to `path` within the established session.
    async fn submit(&self, path: &str, fields: &[(&str, &str)]) -> Result<(), PortalError>;
}

// ============================================================================
// Session Client
// ============================================================================

/// Summary of a page fetched for diagnostics.
#[derive(Debug, Clone)]
pub struct PageSummary {
    /// Response status.
    pub status: StatusCode,
    /// Final URL after redirects.
    pub url: Url,
    /// Status line and headers, cookie values redacted.
    pub dump: String,
}

/// HTTP client holding one portal session.
#[derive(Debug, Clone)]
pub struct SessionClient {
    inner: Client,
    base_url: Url,
}

impl SessionClient {
    /// Creates a client with an empty cookie jar.
    ///
    /// # Errors
    ///
    /// Returns `PortalError::Request` if the TLS backend cannot be initialised.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, PortalError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .cookie_provider(Arc::new(ScopedCookieJar::new()))
            .build()?;

        Ok(Self {
            inner: client,
            base_url,
        })
    }

    /// Creates a client for the configured portal.
    ///
    /// # Errors
    ///
    /// See [`SessionClient::new`].
    pub fn from_config(config: &Config) -> Result<Self, PortalError> {
        Self::new(config.portal_base_url.clone(), config.request_timeout)
    }

    /// Returns the portal base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, PortalError> {
        self.base_url
            .join(path)
            .map_err(|e| PortalError::InvalidUrl(format!("{path}: {e}")))
    }

    /// Posts a urlencoded form and checks the status.
    #[instrument(skip(self, form), fields(path = %path))]
    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<Response, PortalError> {
        let url = self.endpoint(path)?;
        debug!(url = %url, fields = form.len(), "POST request with form data");

        let response = self.inner.post(url).form(form).send().await?;
        check_status(response).await
    }

    /// Fetches a page within the session, for checking that login worked.
    ///
    /// # Errors
    ///
    /// Returns a `PortalError` on transport failure or a 4xx/5xx answer.
    #[instrument(skip(self), fields(path = %path))]
    pub async fn get_page(&self, path: &str) -> Result<PageSummary, PortalError> {
        let url = self.endpoint(path)?;
        debug!(url = %url, "GET request");

        let response = check_status(self.inner.get(url).send().await?).await?;
        Ok(PageSummary {
            status: response.status(),
            url: response.url().clone(),
            dump: dump_response(&response),
        })
    }
}

#[async_trait]
impl PortalSession for SessionClient {
    #[instrument(skip(self, credentials), fields(account = %credentials.account))]
    async fn login(&self, credentials: &Credentials) -> Result<(), PortalError> {
        let form = [
            ("account", credentials.account.as_str()),
            ("password", credentials.password()),
        ];
        self.post_form(LOGIN_PATH, &form).await?;
        info!("Logged in");
        Ok(())
    }

    async fn submit(&self, path: &str, fields: &[(&str, &str)]) -> Result<(), PortalError> {
        self.post_form(path, fields).await?;
        info!(path = %path, "Form accepted");
        Ok(())
    }
}

// ============================================================================
// Response Handling
// ============================================================================

/// Logs the response head and turns anything outside 2xx/3xx into an error.
async fn check_status(response: Response) -> Result<Response, PortalError> {
    let status = response.status();
    let dump = dump_response(&response);
    info!(status = %status, "Response received");
    info!("{dump}");

    if status.is_success() || status.is_redirection() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let cut = (0..=MAX_ERROR_BODY)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        body.truncate(cut);
        body.push('…');
    }

    Err(PortalError::Status {
        status,
        headers: dump,
        body,
    })
}

/// Renders the status line and headers of a response.
fn dump_response(response: &Response) -> String {
    let mut out = format!("{:?} {}", response.version(), response.status());
    out.push_str(&dump_headers(response.headers()));
    out
}

fn dump_headers(headers: &HeaderMap) -> String {
    let mut out = String::new();
    for (name, value) in headers {
        out.push('\n');
        out.push_str(name.as_str());
        out.push_str(": ");
        if name == header::SET_COOKIE || name == header::COOKIE {
            // Keep the cookie name, hide the session value.
            let text = value.to_str().unwrap_or("");
            let cookie_name = text.split('=').next().unwrap_or("");
            out.push_str(cookie_name);
            out.push_str("=<redacted>");
        } else {
            out.push_str(value.to_str().unwrap_or("<binary>"));
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
