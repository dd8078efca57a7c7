//! In-memory relay pool.
//!
//! The pool is an `Arc` snapshot swapped as a whole on refresh, so readers
//! never need the refresh lock and never see a half-built list.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use http::HeaderMap;
use rand::seq::SliceRandom;
use serde_json::json;
use tokio::sync::Mutex;

use crate::config::{ProxyPoolSettings, format_timestamp, keys};
use crate::store::{ConfigStore, get_bool, get_str, partial};
use crate::transport::{BrowserRequest, BrowserTransport};

use super::{ProxyCandidate, ProxyDirectory, ProxyProtocol, RotationStrategy, probe_url};

const MIN_PROXY_COUNT: i64 = 1;
const MAX_PROXY_COUNT: i64 = 20;
const DEFAULT_PROXY_COUNT: u8 = 5;

/// Owns the relay pool and the refresh pipeline feeding it.
pub struct ProxyPoolManager {
    settings: ProxyPoolSettings,
    directory: Arc<dyn ProxyDirectory>,
    transport: Arc<dyn BrowserTransport>,
    store: Arc<dyn ConfigStore>,
    pool: RwLock<Arc<Vec<ProxyCandidate>>>,
    refresh_lock: Mutex<()>,
    cursor: AtomicUsize,
}

impl ProxyPoolManager {
    pub fn new(
        settings: ProxyPoolSettings,
        directory: Arc<dyn ProxyDirectory>,
        transport: Arc<dyn BrowserTransport>,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            settings,
            directory,
            transport,
            store,
            pool: RwLock::new(Arc::new(Vec::new())),
            refresh_lock: Mutex::new(()),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn settings(&self) -> &ProxyPoolSettings {
        &self.settings
    }

    /// Raw addresses from the directory; every failure yields an empty list.
    pub async fn fetch_proxies(&self, protocol: &str, count: i64) -> Vec<String> {
        let protocol = normalize_protocol(protocol);
        let count = normalize_count(count);
        self.fetch_normalized(protocol, count).await
    }

    async fn fetch_normalized(&self, protocol: ProxyProtocol, count: u8) -> Vec<String> {
        log::debug!("[proxy-pool] fetching proxies (protocol: {protocol}, count: {count})");

        let payload = match self.directory.get_proxies(protocol, count).await {
            Ok(payload) => payload,
            Err(err) => {
                log::error!("[proxy-pool] directory request failed: {err}");
                return Vec::new();
            }
        };

        if !payload.is_success() {
            log::error!(
                "[proxy-pool] directory returned code {}: {}",
                payload.code,
                payload.message.as_deref().unwrap_or("unknown error")
            );
            return Vec::new();
        }

        let proxies: Vec<String> = payload
            .into_proxies()
            .into_iter()
            .map(|address| address.trim().to_string())
            .filter(|address| !address.is_empty())
            .collect();
        log::info!("[proxy-pool] fetched {} proxies", proxies.len());
        proxies
    }

    /// Best-effort liveness probe: any status in `[200, 400)` counts.
    pub async fn validate_proxy(&self, address: &str, protocol: ProxyProtocol, test_url: &str) -> bool {
        let proxy = probe_url(address, protocol);
        log::debug!("[proxy-pool] probing {proxy}");

        let session = match self.transport.open_session() {
            Ok(session) => session,
            Err(err) => {
                log::debug!("[proxy-pool] cannot open probe session for {address}: {err}");
                return false;
            }
        };

        let headers = HeaderMap::new();
        let request = BrowserRequest {
            url: test_url,
            headers: &headers,
            profile: None,
            proxy: Some(&proxy),
            timeout: self.settings.probe_timeout,
        };

        match session.get(request).await {
            Ok(response) if (200..400).contains(&response.status) => {
                log::debug!("[proxy-pool] {address} reachable (status {})", response.status);
                true
            }
            Ok(response) => {
                log::debug!("[proxy-pool] {address} unusable (status {})", response.status);
                false
            }
            Err(err) => {
                log::debug!("[proxy-pool] {address} probe failed: {err}");
                false
            }
        }
    }

    pub async fn fetch_and_validate(
        &self,
        protocol: &str,
        count: i64,
        validate: bool,
    ) -> Vec<ProxyCandidate> {
        let protocol = normalize_protocol(protocol);
        let count = normalize_count(count);
        self.collect_candidates(protocol, count, validate).await
    }

    async fn collect_candidates(
        &self,
        protocol: ProxyProtocol,
        count: u8,
        validate: bool,
    ) -> Vec<ProxyCandidate> {
        let addresses = self.fetch_normalized(protocol, count).await;
        if addresses.is_empty() {
            log::warn!("[proxy-pool] directory returned no proxies");
            return Vec::new();
        }

        let mut candidates = Vec::with_capacity(addresses.len());
        for address in addresses {
            let mut candidate = ProxyCandidate::new(address, protocol, Utc::now());
            if validate {
                let reachable = self
                    .validate_proxy(&candidate.address, protocol, &self.settings.health_url)
                    .await;
                candidate.valid = Some(reachable);
            }
            candidates.push(candidate);
        }

        if validate {
            let usable = candidates.iter().filter(|c| c.valid == Some(true)).count();
            log::info!(
                "[proxy-pool] validation finished: {usable}/{} reachable",
                candidates.len()
            );
        }
        candidates
    }

    /// Replaces the pool when the directory produced anything.
    pub async fn refresh_proxies(
        &self,
        protocol: &str,
        count: i64,
        validate: bool,
    ) -> Vec<ProxyCandidate> {
        let protocol = normalize_protocol(protocol);
        let count = normalize_count(count);
        self.refresh_normalized(protocol, count, validate).await
    }

    async fn refresh_normalized(
        &self,
        protocol: ProxyProtocol,
        count: u8,
        validate: bool,
    ) -> Vec<ProxyCandidate> {
        let _guard = self.refresh_lock.lock().await;
        log::info!(
            "[proxy-pool] refreshing (protocol: {protocol}, count: {count}, validate: {validate})"
        );

        let candidates = self.collect_candidates(protocol, count, validate).await;
        if candidates.is_empty() {
            return candidates;
        }

        self.replace_pool(candidates.clone());
        self.cursor.store(0, Ordering::Relaxed);
        log::info!("[proxy-pool] pool updated with {} proxies", candidates.len());

        let summary = partial([
            (keys::PROXY_POOL_LAST_REFRESH, json!(format_timestamp(Utc::now()))),
            (keys::PROXY_POOL_COUNT, json!(candidates.len())),
        ]);
        if let Err(err) = self.store.save(&self.settings.section, summary).await {
            log::warn!("[proxy-pool] failed to persist pool summary: {err}");
        }

        candidates
    }

    /// Refresh using the persisted protocol and validation switches, falling
    /// back to the configured defaults.
    pub async fn refresh_from_settings(&self) -> Vec<ProxyCandidate> {
        let section = match self.store.load(&self.settings.section).await {
            Ok(section) => section,
            Err(err) => {
                log::warn!("[proxy-pool] cannot read pool settings, using defaults: {err}");
                Default::default()
            }
        };

        let protocol = get_str(&section, keys::PROXY_POOL_PROTOCOL)
            .map(normalize_protocol)
            .unwrap_or(self.settings.default_protocol);
        let validate = get_bool(&section, keys::PROXY_POOL_AUTO_VALIDATE)
            .unwrap_or(self.settings.auto_validate);

        self.refresh_normalized(protocol, self.settings.default_count, validate)
            .await
    }

    /// Current pool snapshot.
    pub fn get_proxy_list(&self) -> Arc<Vec<ProxyCandidate>> {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_proxy_list(&self) {
        self.replace_pool(Vec::new());
        log::info!("[proxy-pool] pool cleared");
    }

    /// Candidates not known to be unreachable, in pool order.
    pub fn usable_proxies(&self) -> Vec<ProxyCandidate> {
        self.get_proxy_list()
            .iter()
            .filter(|candidate| candidate.is_usable())
            .cloned()
            .collect()
    }

    /// Resolved URL of the next usable candidate.
    pub fn next_proxy(&self) -> Option<String> {
        let usable = self.usable_proxies();
        if usable.is_empty() {
            return None;
        }

        let picked = match self.settings.rotation {
            RotationStrategy::Sequential => {
                let index = self.cursor.fetch_add(1, Ordering::Relaxed) % usable.len();
                usable.get(index)
            }
            RotationStrategy::Random => usable.choose(&mut rand::thread_rng()),
        };
        picked.map(|candidate| candidate.url.clone())
    }

    fn replace_pool(&self, candidates: Vec<ProxyCandidate>) {
        *self.pool.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(candidates);
    }
}

fn normalize_protocol(raw: &str) -> ProxyProtocol {
    ProxyProtocol::parse(raw).unwrap_or_else(|| {
        log::warn!("[proxy-pool] unsupported protocol '{raw}', using 'all'");
        ProxyProtocol::All
    })
}

fn normalize_count(count: i64) -> u8 {
    if (MIN_PROXY_COUNT..=MAX_PROXY_COUNT).contains(&count) {
        count as u8
    } else {
        log::warn!("[proxy-pool] proxy count {count} out of range, using {DEFAULT_PROXY_COUNT}");
        DEFAULT_PROXY_COUNT
    }
}
