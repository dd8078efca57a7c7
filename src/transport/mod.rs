//! Browser session abstraction.
//!
//! The acquirer and the pool probe never talk to an HTTP client directly.
//! They open a [`BrowserSession`] through a [`BrowserTransport`], issue GET
//! requests that carry a browser profile, and query the session cookie jar.
//! Fingerprint emulation is the implementor's business: the bundled
//! [`ReqwestBrowserTransport`] only presents the profile's headers.

mod reqwest_session;
#[cfg(test)]
pub(crate) mod stub;

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use http::HeaderMap;
use thiserror::Error;

pub use reqwest_session::ReqwestBrowserTransport;

/// Header preset family a profile belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileFamily {
    DesktopChrome,
    MobileSafari,
}

/// Browser impersonation target, e.g. `chrome133a` or `safari18_0_ios`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrowserProfile {
    pub id: Cow<'static, str>,
    pub family: ProfileFamily,
}

impl BrowserProfile {
    pub const fn desktop(id: &'static str) -> Self {
        Self {
            id: Cow::Borrowed(id),
            family: ProfileFamily::DesktopChrome,
        }
    }

    pub const fn mobile(id: &'static str) -> Self {
        Self {
            id: Cow::Borrowed(id),
            family: ProfileFamily::MobileSafari,
        }
    }
}

/// One GET issued through a session.
#[derive(Debug, Clone, Copy)]
pub struct BrowserRequest<'a> {
    pub url: &'a str,
    pub headers: &'a HeaderMap,
    pub profile: Option<&'a BrowserProfile>,
    pub proxy: Option<&'a str>,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserResponse {
    pub status: u16,
    /// Final URL after redirects.
    pub url: String,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid proxy '{proxy}': {message}")]
    InvalidProxy { proxy: String, message: String },
    #[error("invalid url '{0}'")]
    InvalidUrl(String),
    #[error("http transport error: {0}")]
    Transport(String),
}

/// Stateful session; cookies persist across `get` calls on the same session.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn get(&self, request: BrowserRequest<'_>) -> Result<BrowserResponse, TransportError>;

    /// Value of the cookie called `name` (ASCII case-insensitive) whose domain
    /// is `domain_suffix` or one of its subdomains.
    fn cookie(&self, name: &str, domain_suffix: &str) -> Option<String>;
}

/// Factory of fresh sessions with empty cookie jars.
pub trait BrowserTransport: Send + Sync {
    fn open_session(&self) -> Result<Box<dyn BrowserSession>, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
}

impl SessionCookie {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: normalize_domain(&domain.into()),
        }
    }
}

/// Cookies observed by a session, keyed by name and domain.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<SessionCookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the cookie with the same name and domain.
    pub fn insert(&mut self, cookie: SessionCookie) {
        match self
            .cookies
            .iter_mut()
            .find(|existing| existing.name == cookie.name && existing.domain == cookie.domain)
        {
            Some(existing) => existing.value = cookie.value,
            None => self.cookies.push(cookie),
        }
    }

    pub fn find(&self, name: &str, domain_suffix: &str) -> Option<&SessionCookie> {
        let suffix = normalize_domain(domain_suffix);
        self.cookies.iter().find(|cookie| {
            cookie.name.eq_ignore_ascii_case(name) && domain_matches(&cookie.domain, &suffix)
        })
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn domain_matches(domain: &str, suffix: &str) -> bool {
    if suffix.is_empty() {
        return false;
    }
    domain == suffix
        || domain
            .strip_suffix(suffix)
            .is_some_and(|head| head.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jar_matches_apex_and_subdomains_only() {
        let mut jar = CookieJar::new();
        jar.insert(SessionCookie::new("CF_Clearance", "a", ".assets.grok.com"));
        jar.insert(SessionCookie::new("cf_clearance", "b", "notgrok.com"));

        let found = jar.find("cf_clearance", "grok.com").unwrap();
        assert_eq!(found.value, "a");
        assert!(jar.find("cf_clearance", "assets.grok.com").is_some());
        assert!(jar.find("cf_clearance", "other.com").is_none());
        assert!(jar.find("__cf_bm", "grok.com").is_none());
    }

    #[test]
    fn jar_replaces_same_name_and_domain() {
        let mut jar = CookieJar::new();
        jar.insert(SessionCookie::new("cf_clearance", "old", "grok.com"));
        jar.insert(SessionCookie::new("cf_clearance", "new", ".grok.com"));
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.find("cf_clearance", "grok.com").unwrap().value, "new");
    }
}
