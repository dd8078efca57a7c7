//! Relay pool acquisition, validation and selection.
//!
//! Candidates come from a third-party directory as bare `host:port` strings.
//! Each one gets a resolved URL for downstream use, and optionally a
//! liveness verdict from probing the protected service through it.

pub mod directory;
pub mod pool;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use directory::{
    DirectoryData, DirectoryError, DirectoryPayload, ProxyDirectory, ReqwestProxyDirectory,
};
pub use pool::ProxyPoolManager;

/// How [`ProxyPoolManager::next_proxy`] picks among usable candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStrategy {
    #[default]
    Sequential,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyProtocol {
    Http,
    Https,
    Socks4,
    Socks5,
    All,
}

impl ProxyProtocol {
    /// Case-insensitive parse of the directory's protocol names.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            "socks4" => Some(Self::Socks4),
            "socks5" => Some(Self::Socks5),
            "all" => Some(Self::All),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
            Self::Socks4 => "socks4",
            Self::Socks5 => "socks5",
            Self::All => "all",
        }
    }

    /// Scheme used when probing; `all` falls back to plain HTTP.
    pub fn probe_scheme(self) -> &'static str {
        match self {
            Self::All => "http",
            other => other.as_str(),
        }
    }

    /// Scheme handed to consumers; SOCKS5 resolves hostnames on the relay.
    pub fn resolved_scheme(self) -> &'static str {
        match self {
            Self::Socks5 => "socks5h",
            other => other.probe_scheme(),
        }
    }
}

impl fmt::Display for ProxyProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn probe_url(address: &str, protocol: ProxyProtocol) -> String {
    format!("{}://{}", protocol.probe_scheme(), address)
}

pub fn resolved_url(address: &str, protocol: ProxyProtocol) -> String {
    format!("{}://{}", protocol.resolved_scheme(), address)
}

/// One relay returned by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyCandidate {
    pub address: String,
    pub protocol: ProxyProtocol,
    pub url: String,
    /// `None` until a validation pass has run.
    pub valid: Option<bool>,
    pub fetched_at: DateTime<Utc>,
}

impl ProxyCandidate {
    pub fn new(address: impl Into<String>, protocol: ProxyProtocol, fetched_at: DateTime<Utc>) -> Self {
        let address = address.into();
        Self {
            url: resolved_url(&address, protocol),
            address,
            protocol,
            valid: None,
            fetched_at,
        }
    }

    /// Unvalidated candidates count as usable.
    pub fn is_usable(&self) -> bool {
        self.valid != Some(false)
    }
}
