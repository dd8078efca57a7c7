//! Reqwest-based implementation of the browser session traits.
//!
//! Presents the profile's header preset and keeps a cookie store per session.
//! It does not reproduce browser TLS fingerprints; plug a dedicated transport
//! in when the protected service checks them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::cookie::{CookieStore, Jar};
use tokio::sync::Mutex;
use url::Url;

use super::{
    BrowserRequest, BrowserResponse, BrowserSession, BrowserTransport, CookieJar, SessionCookie,
    TransportError,
};

/// Opens reqwest-backed sessions.
#[derive(Debug, Clone, Default)]
pub struct ReqwestBrowserTransport {
    _private: (),
}

impl ReqwestBrowserTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BrowserTransport for ReqwestBrowserTransport {
    fn open_session(&self) -> Result<Box<dyn BrowserSession>, TransportError> {
        Ok(Box::new(ReqwestBrowserSession::new()))
    }
}

/// One cookie store shared by a client per proxy endpoint.
struct ReqwestBrowserSession {
    store: Arc<Jar>,
    clients: Mutex<HashMap<Option<String>, Client>>,
    observed: StdMutex<CookieJar>,
}

impl ReqwestBrowserSession {
    fn new() -> Self {
        Self {
            store: Arc::new(Jar::default()),
            clients: Mutex::new(HashMap::new()),
            observed: StdMutex::new(CookieJar::new()),
        }
    }

    async fn client(&self, proxy: Option<&str>) -> Result<Client, TransportError> {
        let mut guard = self.clients.lock().await;
        let key = proxy.map(str::to_string);
        if let Some(client) = guard.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder().cookie_provider(self.store.clone());
        builder = match proxy {
            Some(endpoint) => {
                let relay = reqwest::Proxy::all(endpoint).map_err(|err| {
                    TransportError::InvalidProxy {
                        proxy: endpoint.to_string(),
                        message: err.to_string(),
                    }
                })?;
                builder.proxy(relay)
            }
            // Without an explicit relay, environment proxies must not leak in.
            None => builder.no_proxy(),
        };

        let client = builder
            .build()
            .map_err(|err| TransportError::Transport(err.to_string()))?;
        guard.insert(key, client.clone());
        Ok(client)
    }

    fn capture(&self, response: &reqwest::Response) {
        let final_url = response.url();
        let host = final_url.host_str().unwrap_or_default().to_string();
        let mut observed = self.observed.lock().unwrap_or_else(PoisonError::into_inner);

        for cookie in response.cookies() {
            let domain = cookie.domain().unwrap_or(host.as_str());
            observed.insert(SessionCookie::new(cookie.name(), cookie.value(), domain));
        }

        // Cookies set on intermediate redirect hops only live in the store.
        if let Some(header) = self.store.cookies(final_url)
            && let Ok(text) = header.to_str()
        {
            for pair in text.split(';') {
                if let Some((name, value)) = pair.trim().split_once('=')
                    && observed.find(name, &host).is_none()
                {
                    observed.insert(SessionCookie::new(name, value, host.as_str()));
                }
            }
        }
    }
}

#[async_trait]
impl BrowserSession for ReqwestBrowserSession {
    async fn get(&self, request: BrowserRequest<'_>) -> Result<BrowserResponse, TransportError> {
        let url =
            Url::parse(request.url).map_err(|_| TransportError::InvalidUrl(request.url.into()))?;
        let client = self.client(request.proxy).await?;

        if let Some(profile) = request.profile {
            log::trace!("GET {} as {}", url, profile.id);
        }

        let response = client
            .get(url)
            .headers(request.headers.clone())
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|err| map_error(err, request.timeout))?;

        self.capture(&response);
        Ok(BrowserResponse {
            status: response.status().as_u16(),
            url: response.url().to_string(),
        })
    }

    fn cookie(&self, name: &str, domain_suffix: &str) -> Option<String> {
        self.observed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .find(name, domain_suffix)
            .map(|cookie| cookie.value.clone())
    }
}

fn map_error(err: reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else {
        TransportError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;

    #[tokio::test]
    async fn rejects_malformed_urls_before_sending() {
        let session = ReqwestBrowserTransport::new().open_session().unwrap();
        let headers = HeaderMap::new();
        let err = session
            .get(BrowserRequest {
                url: "not a url",
                headers: &headers,
                profile: None,
                proxy: None,
                timeout: Duration::from_secs(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn fresh_session_has_no_cookies() {
        let session = ReqwestBrowserTransport::new().open_session().unwrap();
        assert!(session.cookie("cf_clearance", "grok.com").is_none());
    }
}
