//! Scripted transport shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{
    BrowserRequest, BrowserResponse, BrowserSession, BrowserTransport, CookieJar, SessionCookie,
    TransportError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StubCall {
    pub url: String,
    pub profile: Option<String>,
    pub proxy: Option<String>,
    pub timeout: Duration,
}

pub(crate) enum StubReply {
    Status(u16),
    Cookie(u16, SessionCookie),
    Fail,
}

type Responder = dyn Fn(&StubCall, usize) -> StubReply + Send + Sync;

struct StubInner {
    responder: Box<Responder>,
    latency: Duration,
    calls: Mutex<Vec<StubCall>>,
    sessions: AtomicUsize,
}

/// Answers every GET through a closure that receives the call and its index.
/// Clones share the call log.
#[derive(Clone)]
pub(crate) struct StubTransport {
    inner: Arc<StubInner>,
}

impl StubTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&StubCall, usize) -> StubReply + Send + Sync + 'static,
    {
        Self::with_latency(Duration::ZERO, responder)
    }

    pub fn with_latency<F>(latency: Duration, responder: F) -> Self
    where
        F: Fn(&StubCall, usize) -> StubReply + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(StubInner {
                responder: Box::new(responder),
                latency,
                calls: Mutex::new(Vec::new()),
                sessions: AtomicUsize::new(0),
            }),
        }
    }

    pub fn calls(&self) -> Vec<StubCall> {
        self.inner.calls.lock().unwrap().clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.inner.sessions.load(Ordering::SeqCst)
    }
}

impl BrowserTransport for StubTransport {
    fn open_session(&self) -> Result<Box<dyn BrowserSession>, TransportError> {
        self.inner.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubSession {
            transport: self.inner.clone(),
            jar: Mutex::new(CookieJar::new()),
        }))
    }
}

struct StubSession {
    transport: Arc<StubInner>,
    jar: Mutex<CookieJar>,
}

#[async_trait]
impl BrowserSession for StubSession {
    async fn get(&self, request: BrowserRequest<'_>) -> Result<BrowserResponse, TransportError> {
        if !self.transport.latency.is_zero() {
            tokio::time::sleep(self.transport.latency).await;
        }

        let call = StubCall {
            url: request.url.to_string(),
            profile: request.profile.map(|profile| profile.id.to_string()),
            proxy: request.proxy.map(str::to_string),
            timeout: request.timeout,
        };
        let index = {
            let mut calls = self.transport.calls.lock().unwrap();
            calls.push(call.clone());
            calls.len() - 1
        };

        match (self.transport.responder)(&call, index) {
            StubReply::Status(status) => Ok(BrowserResponse {
                status,
                url: call.url,
            }),
            StubReply::Cookie(status, cookie) => {
                self.jar.lock().unwrap().insert(cookie);
                Ok(BrowserResponse {
                    status,
                    url: call.url,
                })
            }
            StubReply::Fail => Err(TransportError::Transport("connection reset".into())),
        }
    }

    fn cookie(&self, name: &str, domain_suffix: &str) -> Option<String> {
        self.jar
            .lock()
            .unwrap()
            .find(name, domain_suffix)
            .map(|cookie| cookie.value.clone())
    }
}
