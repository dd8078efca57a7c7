//! Tunables for the clearance acquirer and the proxy pool manager.

use std::time::Duration;

use thiserror::Error;

use crate::clearance::{AcquisitionStrategy, default_strategies};
use crate::proxy::{ProxyProtocol, RotationStrategy};

use super::{DEFAULT_CLEARANCE_PREFIX, DEFAULT_SECTION};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("apex domain must not be empty")]
    EmptyDomain,
    #[error("clearance cookie name must not be empty")]
    EmptyCookieName,
    #[error("at least one acquisition strategy is required")]
    NoStrategies,
    #[error("strategy '{0}' has no endpoints")]
    EmptyStrategy(String),
}

/// URLs of the protected service the strategies can target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoints {
    pub homepage: String,
    pub asset: String,
    pub health: String,
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            homepage: "https://grok.com/".into(),
            asset: "https://assets.grok.com/favicon.ico".into(),
            health: "https://grok.com/rest/health".into(),
        }
    }
}

/// Settings consumed by [`crate::ClearanceAcquirer`].
#[derive(Debug, Clone)]
pub struct ClearanceSettings {
    /// Store section holding the clearance keys and the relay URL.
    pub section: String,
    /// Cookies are accepted for this domain and its subdomains.
    pub apex_domain: String,
    pub cookie_name: String,
    pub persisted_prefix: String,
    pub endpoints: ServiceEndpoints,
    /// Overrides the built-in strategy table when set.
    pub strategies: Option<Vec<AcquisitionStrategy>>,
    pub request_timeout: Duration,
    /// Pause between two strategies of the same sweep.
    pub strategy_delay: Duration,
}

impl Default for ClearanceSettings {
    fn default() -> Self {
        Self {
            section: DEFAULT_SECTION.into(),
            apex_domain: "grok.com".into(),
            cookie_name: "cf_clearance".into(),
            persisted_prefix: DEFAULT_CLEARANCE_PREFIX.into(),
            endpoints: ServiceEndpoints::default(),
            strategies: None,
            request_timeout: Duration::from_secs(30),
            strategy_delay: Duration::from_secs(1),
        }
    }
}

impl ClearanceSettings {
    pub fn builder() -> ClearanceSettingsBuilder {
        ClearanceSettingsBuilder::new()
    }

    /// Strategy list in priority order.
    pub fn resolved_strategies(&self) -> Vec<AcquisitionStrategy> {
        match &self.strategies {
            Some(custom) => custom.clone(),
            None => default_strategies(&self.endpoints),
        }
    }
}

/// Fluent builder for [`ClearanceSettings`].
pub struct ClearanceSettingsBuilder {
    settings: ClearanceSettings,
}

impl ClearanceSettingsBuilder {
    pub fn new() -> Self {
        Self {
            settings: ClearanceSettings::default(),
        }
    }

    pub fn with_section(mut self, section: impl Into<String>) -> Self {
        self.settings.section = section.into();
        self
    }

    pub fn with_apex_domain(mut self, domain: impl Into<String>) -> Self {
        self.settings.apex_domain = domain.into().trim_start_matches('.').to_ascii_lowercase();
        self
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.cookie_name = name.into();
        self
    }

    pub fn with_endpoints(mut self, endpoints: ServiceEndpoints) -> Self {
        self.settings.endpoints = endpoints;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<AcquisitionStrategy>) -> Self {
        self.settings.strategies = Some(strategies);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.settings.request_timeout = timeout;
        self
    }

    pub fn with_strategy_delay(mut self, delay: Duration) -> Self {
        self.settings.strategy_delay = delay;
        self
    }

    pub fn build(self) -> Result<ClearanceSettings, SettingsError> {
        let settings = self.settings;
        if settings.apex_domain.is_empty() {
            return Err(SettingsError::EmptyDomain);
        }
        if settings.cookie_name.trim().is_empty() {
            return Err(SettingsError::EmptyCookieName);
        }
        if let Some(strategies) = &settings.strategies {
            if strategies.is_empty() {
                return Err(SettingsError::NoStrategies);
            }
            if let Some(empty) = strategies.iter().find(|s| s.endpoints.is_empty()) {
                return Err(SettingsError::EmptyStrategy(empty.name.clone()));
            }
        }
        Ok(settings)
    }
}

impl Default for ClearanceSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings consumed by [`crate::ProxyPoolManager`].
#[derive(Debug, Clone)]
pub struct ProxyPoolSettings {
    pub section: String,
    pub directory_url: String,
    /// Lightweight endpoint of the protected service used to probe candidates.
    pub health_url: String,
    pub directory_timeout: Duration,
    pub probe_timeout: Duration,
    pub rotation: RotationStrategy,
    pub default_protocol: ProxyProtocol,
    pub default_count: u8,
    pub auto_validate: bool,
}

impl Default for ProxyPoolSettings {
    fn default() -> Self {
        Self {
            section: DEFAULT_SECTION.into(),
            directory_url: "https://proxy.scdn.io/api/get_proxy.php".into(),
            health_url: ServiceEndpoints::default().health,
            directory_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(10),
            rotation: RotationStrategy::Sequential,
            default_protocol: ProxyProtocol::All,
            default_count: 5,
            auto_validate: true,
        }
    }
}

impl ProxyPoolSettings {
    pub fn with_health_url(mut self, url: impl Into<String>) -> Self {
        self.health_url = url.into();
        self
    }

    pub fn with_directory_url(mut self, url: impl Into<String>) -> Self {
        self.directory_url = url.into();
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_rotation(mut self, rotation: RotationStrategy) -> Self {
        self.rotation = rotation;
        self
    }
}
