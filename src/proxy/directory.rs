//! Third-party proxy directory client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ProxyPoolSettings;

use super::ProxyProtocol;

/// Payload returned by the directory: `{code, message, data: {proxies}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DirectoryPayload {
    pub code: i64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<DirectoryData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DirectoryData {
    #[serde(default)]
    pub proxies: Vec<String>,
}

impl DirectoryPayload {
    pub fn is_success(&self) -> bool {
        self.code == 200
    }

    pub fn into_proxies(self) -> Vec<String> {
        self.data.map(|data| data.proxies).unwrap_or_default()
    }
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory answered http {0}")]
    Status(u16),
    #[error("directory request timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed directory payload: {0}")]
    Malformed(String),
    #[error("directory transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait ProxyDirectory: Send + Sync {
    async fn get_proxies(
        &self,
        protocol: ProxyProtocol,
        count: u8,
    ) -> Result<DirectoryPayload, DirectoryError>;
}

/// Plain reqwest client for the directory; no impersonation needed.
#[derive(Debug, Clone)]
pub struct ReqwestProxyDirectory {
    client: Client,
    endpoint: String,
    timeout: Duration,
}

impl ReqwestProxyDirectory {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .build()
            .map_err(|err| DirectoryError::Transport(err.to_string()))?;
        Ok(Self::from_client(client, endpoint, timeout))
    }

    /// Client for the directory endpoint and timeout configured for the pool.
    pub fn from_settings(settings: &ProxyPoolSettings) -> Result<Self, DirectoryError> {
        Self::new(settings.directory_url.clone(), settings.directory_timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn from_client(client: Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ProxyDirectory for ReqwestProxyDirectory {
    async fn get_proxies(
        &self,
        protocol: ProxyProtocol,
        count: u8,
    ) -> Result<DirectoryPayload, DirectoryError> {
        let count = count.to_string();
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("protocol", protocol.as_str()), ("count", count.as_str())])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| self.map_error(err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status(status.as_u16()));
        }

        response
            .json::<DirectoryPayload>()
            .await
            .map_err(|err| self.map_error(err))
    }
}

impl ReqwestProxyDirectory {
    fn map_error(&self, err: reqwest::Error) -> DirectoryError {
        if err.is_timeout() {
            DirectoryError::Timeout(self.timeout)
        } else if err.is_decode() {
            DirectoryError::Malformed(err.to_string())
        } else {
            DirectoryError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_directory_payload() {
        let payload: DirectoryPayload = serde_json::from_str(
            r#"{"code":200,"message":"ok","data":{"proxies":["1.1.1.1:80","2.2.2.2:1080"],"count":2}}"#,
        )
        .unwrap();
        assert!(payload.is_success());
        assert_eq!(payload.into_proxies(), vec!["1.1.1.1:80", "2.2.2.2:1080"]);
    }

    #[test]
    fn built_from_pool_settings() {
        let settings = ProxyPoolSettings::default()
            .with_directory_url("https://directory.example/api/list");
        let directory = ReqwestProxyDirectory::from_settings(&settings).unwrap();
        assert_eq!(directory.endpoint(), "https://directory.example/api/list");
        assert_eq!(directory.timeout, settings.directory_timeout);
    }

    #[test]
    fn error_payload_without_data_yields_nothing() {
        let payload: DirectoryPayload =
            serde_json::from_str(r#"{"code":429,"message":"rate limited"}"#).unwrap();
        assert!(!payload.is_success());
        assert_eq!(payload.message.as_deref(), Some("rate limited"));
        assert!(payload.into_proxies().is_empty());
    }
}
