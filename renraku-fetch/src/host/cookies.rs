//! Session cookie jar scoped to registrable domains.
//!
//! Wraps reqwest's in-memory [`Jar`] and drops any `Set-Cookie` whose
//! `Domain` attribute is a public suffix (`net`, `co.jp`, ...) or names a
//! different registrable domain than the responding host. Everything else
//! (path matching, expiry, `Secure`) is left to the inner jar.

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use tracing::{debug, warn};
use url::Url;

/// Cookie store that refuses cookies scoped wider than a registrable domain.
///
/// One jar belongs to one session client and lives for one run.
#[derive(Debug, Default)]
pub struct ScopedCookieJar {
    inner: Jar,
}

impl ScopedCookieJar {
    /// Creates an empty jar.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `header` may be stored for a response from `url`.
    fn accepts(header: &HeaderValue, url: &Url) -> bool {
        let Ok(raw) = header.to_str() else {
            return false;
        };
        let Ok(cookie) = cookie::Cookie::parse(raw) else {
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };

        // Host-only cookies never leave the host that set them.
        let Some(domain) = cookie.domain() else {
            return true;
        };

        let host = host.to_ascii_lowercase();
        let domain = domain.trim_start_matches('.').to_ascii_lowercase();

        if domain == host {
            return true;
        }

        // Addresses have no parent domain.
        if !matches!(url.host(), Some(url::Host::Domain(_))) {
            warn!(cookie = %cookie.name(), domain = %domain, host = %host, "Rejecting domain cookie for an IP host");
            return false;
        }

        if psl::suffix_str(&domain) == Some(domain.as_str()) {
            warn!(cookie = %cookie.name(), domain = %domain, "Rejecting cookie scoped to a public suffix");
            return false;
        }

        let same_site = match (psl::domain_str(&host), psl::domain_str(&domain)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        };

        if same_site && host.ends_with(&format!(".{domain}")) {
            true
        } else {
            warn!(cookie = %cookie.name(), domain = %domain, host = %host, "Rejecting cookie for a foreign domain");
            false
        }
    }
}

impl CookieStore for ScopedCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let accepted: Vec<HeaderValue> = cookie_headers
            .filter(|header| Self::accepts(header, url))
            .cloned()
            .collect();

        debug!(count = accepted.len(), url = %url, "Storing cookies");
        self.inner.set_cookies(&mut accepted.iter(), url);
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        self.inner.cookies(url)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn store(jar: &ScopedCookieJar, header: &str, from: &str) {
        let value = HeaderValue::from_str(header).unwrap();
        jar.set_cookies(&mut std::iter::once(&value), &url(from));
    }

    fn sent(jar: &ScopedCookieJar, to: &str) -> String {
        jar.cookies(&url(to))
            .map(|v| v.to_str().unwrap().to_string())
            .unwrap_or_default()
    }

    const LOGIN: &str = "https://parents.cloud-sakura.net/pages/accounts/login.php";
    const REGIST: &str = "https://parents.cloud-sakura.net/pages/contact-book/regist-api.php";

    #[test]
    fn test_session_cookie_survives_between_paths() {
        let jar = ScopedCookieJar::new();
        store(&jar, "PHPSESSID=abc123; Path=/; Secure; HttpOnly", LOGIN);
        assert!(sent(&jar, REGIST).contains("PHPSESSID=abc123"));
    }

    #[test]
    fn test_host_only_cookie_stays_on_host() {
        let jar = ScopedCookieJar::new();
        store(&jar, "PHPSESSID=abc123; Path=/", LOGIN);
        assert!(sent(&jar, "https://www.cloud-sakura.net/").is_empty());
    }

    #[test]
    fn test_registrable_domain_cookie_is_shared() {
        let jar = ScopedCookieJar::new();
        store(&jar, "lang=ja; Path=/; Domain=.cloud-sakura.net", LOGIN);
        assert!(sent(&jar, "https://www.cloud-sakura.net/").contains("lang=ja"));
    }

    #[test]
    fn test_public_suffix_cookie_is_rejected() {
        let jar = ScopedCookieJar::new();
        store(&jar, "track=1; Path=/; Domain=net", LOGIN);
        assert!(sent(&jar, "https://example.net/").is_empty());
        assert!(sent(&jar, REGIST).is_empty());
    }

    #[test]
    fn test_foreign_domain_cookie_is_rejected() {
        let header = HeaderValue::from_static("x=1; Domain=example.com");
        assert!(!ScopedCookieJar::accepts(&header, &url(LOGIN)));

        let header = HeaderValue::from_static("x=1; Domain=cloud-sakura.net");
        assert!(ScopedCookieJar::accepts(&header, &url(LOGIN)));
    }

    #[test]
    fn test_ip_host_accepts_exact_domain_only() {
        let local = url("http://127.0.0.1:8081/pages/accounts/login.php");
        let exact = HeaderValue::from_static("s=1; Domain=127.0.0.1");
        let wider = HeaderValue::from_static("s=1; Domain=0.1");
        assert!(ScopedCookieJar::accepts(&exact, &local));
        assert!(!ScopedCookieJar::accepts(&wider, &local));
    }
}
