//! Multi-strategy clearance acquisition.
//!
//! A refresh ("sweep") walks the strategy list in order, one request at a
//! time, and stops at the first response that leaves a matching clearance
//! cookie in the session jar. Concurrent refreshes are collapsed: callers that
//! queued behind a running sweep reuse its outcome instead of starting another.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::config::{ClearanceSettings, keys};
use crate::store::{ConfigStore, ConfigStoreError, get_str, partial};
use crate::transport::{BrowserRequest, BrowserTransport, TransportError};

use super::headers::header_preset;
use super::state::{
    ClearanceState, failure_update, mask_relay, normalize_relay, strip_clearance_prefix,
    success_update,
};
use super::strategy::AcquisitionStrategy;

#[derive(Debug, Error)]
pub enum ClearanceError {
    #[error("settings store error: {0}")]
    Store(#[from] ConfigStoreError),
}

/// Outcome of a single endpoint request.
#[derive(Debug)]
enum EndpointOutcome {
    Cookie(String),
    NoCookie(u16),
    Failed(TransportError),
}

#[derive(Debug)]
enum SweepOutcome {
    Acquired { strategy: String, token: String },
    Exhausted { attempted: usize, relay: Option<String> },
}

/// Owns the strategy list, the single-flight lock and the clearance state.
pub struct ClearanceAcquirer {
    settings: ClearanceSettings,
    strategies: Vec<AcquisitionStrategy>,
    transport: Arc<dyn BrowserTransport>,
    store: Arc<dyn ConfigStore>,
    state: RwLock<Arc<ClearanceState>>,
    refresh_lock: Mutex<()>,
    completed_sweeps: AtomicU64,
    /// What the latest completed refresh returned, handed to queued callers.
    last_sweep: RwLock<Option<String>>,
}

impl ClearanceAcquirer {
    pub fn new(
        settings: ClearanceSettings,
        transport: Arc<dyn BrowserTransport>,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        let strategies = settings.resolved_strategies();
        Self {
            settings,
            strategies,
            transport,
            store,
            state: RwLock::new(Arc::new(ClearanceState::default())),
            refresh_lock: Mutex::new(()),
            completed_sweeps: AtomicU64::new(0),
            last_sweep: RwLock::new(None),
        }
    }

    pub fn strategies(&self) -> &[AcquisitionStrategy] {
        &self.strategies
    }

    /// Lock-free snapshot of the current state.
    pub fn state(&self) -> Arc<ClearanceState> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_state(&self, next: ClearanceState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    fn cached_token(&self) -> Option<String> {
        self.state().token.clone().filter(|token| !token.is_empty())
    }

    /// Loads the persisted clearance fields, e.g. a token configured by hand.
    ///
    /// Needed once at startup for the diagnostics; `ensure` also picks up a
    /// token written to the store later, as long as none is cached.
    pub async fn hydrate(&self) -> Result<(), ClearanceError> {
        let _guard = self.refresh_lock.lock().await;
        let section = self.store.load(&self.settings.section).await?;
        let state = ClearanceState::from_section(&section, &self.settings.persisted_prefix);
        log::debug!(
            "[clearance] hydrated state (token present: {})",
            state.token.is_some()
        );
        self.replace_state(state);
        Ok(())
    }

    /// Cached token if any, then a token found in the store, otherwise a
    /// refresh. Never checks token age.
    pub async fn ensure(&self) -> Option<String> {
        if let Some(token) = self.cached_token() {
            return Some(token);
        }
        if let Some(token) = self.stored_token().await {
            return Some(token);
        }
        self.refresh().await
    }

    async fn stored_token(&self) -> Option<String> {
        let section = match self.store.load(&self.settings.section).await {
            Ok(section) => section,
            Err(err) => {
                log::debug!("[clearance] cannot read stored token: {err}");
                return None;
            }
        };

        let token = get_str(&section, keys::CF_CLEARANCE)
            .map(|raw| strip_clearance_prefix(raw, &self.settings.persisted_prefix).trim())
            .filter(|token| !token.is_empty())?
            .to_string();

        log::info!("[clearance] using token found in the settings store");
        let next = ClearanceState {
            token: Some(token.clone()),
            ..self.state().as_ref().clone()
        };
        self.replace_state(next);
        Some(token)
    }

    fn last_sweep(&self) -> Option<String> {
        self.last_sweep
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs a sweep unless one completed while this caller waited for the lock.
    pub async fn refresh(&self) -> Option<String> {
        let observed = self.completed_sweeps.load(Ordering::Acquire);
        let _guard = self.refresh_lock.lock().await;

        if self.completed_sweeps.load(Ordering::Acquire) != observed {
            log::debug!("[clearance] reusing the outcome of the sweep that just finished");
            return self.last_sweep();
        }

        let result = match self.sweep().await {
            Ok(SweepOutcome::Acquired { strategy, token }) => {
                self.record_success(&strategy, &token).await;
                Some(token)
            }
            Ok(SweepOutcome::Exhausted { attempted, relay }) => {
                let diagnostic = format!(
                    "all {attempted} clearance strategies failed (relay: {})",
                    mask_relay(relay.as_deref())
                );
                log::warn!(
                    "[clearance] {diagnostic}; configure the cookie manually or change the relay/IP"
                );
                self.record_failure(&diagnostic).await;
                None
            }
            Err(err) => {
                let diagnostic = format!("clearance refresh aborted: {err}");
                log::error!("[clearance] {diagnostic}");
                self.record_failure(&diagnostic).await;
                None
            }
        };

        *self.last_sweep.write().unwrap_or_else(PoisonError::into_inner) = result.clone();
        self.completed_sweeps.fetch_add(1, Ordering::Release);
        result
    }

    /// Drops the cached token so the next `ensure` runs a sweep.
    pub async fn invalidate(&self) {
        let _guard = self.refresh_lock.lock().await;
        let next = self.state().without_token();
        self.replace_state(next);

        let update = partial([(keys::CF_CLEARANCE, json!(""))]);
        if let Err(err) = self.store.save(&self.settings.section, update).await {
            log::warn!("[clearance] failed to persist invalidated token: {err}");
        }
        log::info!("[clearance] cached token invalidated");
    }

    async fn resolve_relay(&self) -> Result<Option<String>, ClearanceError> {
        let section = self.store.load(&self.settings.section).await?;
        Ok(get_str(&section, keys::PROXY_URL).and_then(normalize_relay))
    }

    async fn sweep(&self) -> Result<SweepOutcome, ClearanceError> {
        let relay = self.resolve_relay().await?;
        match relay.as_deref() {
            Some(relay) => log::debug!(
                "[clearance] acquiring through relay {}",
                mask_relay(Some(relay))
            ),
            None => log::debug!("[clearance] no relay configured, connecting directly"),
        }

        let total = self.strategies.len();
        for (index, strategy) in self.strategies.iter().enumerate() {
            log::debug!(
                "[clearance] strategy {}/{}: {} ({})",
                index + 1,
                total,
                strategy.name,
                strategy.description
            );

            if let Some(token) = self.attempt(strategy, relay.as_deref()).await {
                return Ok(SweepOutcome::Acquired {
                    strategy: strategy.name.clone(),
                    token,
                });
            }

            if index + 1 < total && !self.settings.strategy_delay.is_zero() {
                sleep(self.settings.strategy_delay).await;
            }
        }

        Ok(SweepOutcome::Exhausted {
            attempted: total,
            relay,
        })
    }

    /// Visits the strategy's endpoints in order within one session.
    async fn attempt(&self, strategy: &AcquisitionStrategy, relay: Option<&str>) -> Option<String> {
        let session = match self.transport.open_session() {
            Ok(session) => session,
            Err(err) => {
                log::warn!("[clearance] {}: cannot open session: {err}", strategy.name);
                return None;
            }
        };
        let headers = header_preset(strategy.profile.family);

        for endpoint in &strategy.endpoints {
            let request = BrowserRequest {
                url: endpoint,
                headers: &headers,
                profile: Some(&strategy.profile),
                proxy: relay,
                timeout: self.settings.request_timeout,
            };

            let outcome = match session.get(request).await {
                Ok(response) => match session
                    .cookie(&self.settings.cookie_name, &self.settings.apex_domain)
                    .filter(|value| !value.is_empty())
                {
                    Some(value) => EndpointOutcome::Cookie(value),
                    None => EndpointOutcome::NoCookie(response.status),
                },
                Err(err) => EndpointOutcome::Failed(err),
            };

            match outcome {
                EndpointOutcome::Cookie(value) => {
                    log::debug!("[clearance] {}: cookie issued by {endpoint}", strategy.name);
                    return Some(value);
                }
                EndpointOutcome::NoCookie(status) => {
                    log::debug!(
                        "[clearance] {}: {endpoint} answered {status} without a cookie",
                        strategy.name
                    );
                }
                EndpointOutcome::Failed(err) => {
                    log::warn!("[clearance] {}: {endpoint} failed: {err}", strategy.name);
                }
            }
        }

        None
    }

    async fn record_success(&self, strategy: &str, token: &str) {
        let now = Utc::now();
        let next = self.state().succeeded(token, strategy, now);
        self.replace_state(next);

        let update = success_update(token, &self.settings.persisted_prefix, strategy, now);
        match self.store.save(&self.settings.section, update).await {
            Ok(()) => log::info!("[clearance] acquired and saved clearance via {strategy}"),
            Err(err) => log::warn!(
                "[clearance] acquired clearance via {strategy} but failed to persist it: {err}"
            ),
        }
    }

    async fn record_failure(&self, diagnostic: &str) {
        let now = Utc::now();
        let next = self.state().failed(diagnostic, now);
        self.replace_state(next);

        if let Err(err) = self
            .store
            .save(&self.settings.section, failure_update(diagnostic, now))
            .await
        {
            log::error!("[clearance] failed to persist diagnostic: {err}");
        }
    }
}
