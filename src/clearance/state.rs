//! Clearance bookkeeping and its persisted form.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use crate::config::{format_timestamp, keys, parse_timestamp};
use crate::store::{ConfigSection, get_str, partial};

/// Last known clearance token plus the outcome of the latest sweep.
///
/// The token never carries the persisted `cf_clearance=` tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClearanceState {
    pub token: Option<String>,
    pub last_success_method: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl ClearanceState {
    /// Rebuilds the state from a persisted section.
    pub fn from_section(section: &ConfigSection, prefix: &str) -> Self {
        let token = get_str(section, keys::CF_CLEARANCE)
            .map(|raw| strip_clearance_prefix(raw, prefix).trim())
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        Self {
            token,
            last_success_method: get_str(section, keys::CF_LAST_METHOD).map(str::to_string),
            last_success_at: get_str(section, keys::CF_LAST_SUCCESS_AT).and_then(parse_timestamp),
            last_error: get_str(section, keys::CF_LAST_ERROR).map(str::to_string),
            last_error_at: get_str(section, keys::CF_LAST_ERROR_AT).and_then(parse_timestamp),
        }
    }

    pub(crate) fn succeeded(&self, token: &str, method: &str, at: DateTime<Utc>) -> Self {
        Self {
            token: Some(token.to_string()),
            last_success_method: Some(method.to_string()),
            last_success_at: Some(at),
            last_error: None,
            last_error_at: None,
        }
    }

    /// Keeps any previous token; freshness is the caller's call.
    pub(crate) fn failed(&self, diagnostic: &str, at: DateTime<Utc>) -> Self {
        Self {
            last_error: Some(diagnostic.to_string()),
            last_error_at: Some(at),
            ..self.clone()
        }
    }

    pub(crate) fn without_token(&self) -> Self {
        Self {
            token: None,
            ..self.clone()
        }
    }
}

pub(crate) fn success_update(
    token: &str,
    prefix: &str,
    method: &str,
    at: DateTime<Utc>,
) -> ConfigSection {
    partial([
        (keys::CF_CLEARANCE, json!(format!("{prefix}{token}"))),
        (keys::CF_LAST_ERROR, json!("")),
        (keys::CF_LAST_ERROR_AT, json!("")),
        (keys::CF_LAST_METHOD, json!(method)),
        (keys::CF_LAST_SUCCESS_AT, json!(format_timestamp(at))),
    ])
}

pub(crate) fn failure_update(diagnostic: &str, at: DateTime<Utc>) -> ConfigSection {
    partial([
        (keys::CF_LAST_ERROR, Value::String(diagnostic.to_string())),
        (keys::CF_LAST_ERROR_AT, Value::String(format_timestamp(at))),
    ])
}

pub fn strip_clearance_prefix<'a>(raw: &'a str, prefix: &str) -> &'a str {
    raw.strip_prefix(prefix).unwrap_or(raw)
}

/// Relay descriptor safe for logs and diagnostics: credentials, and anything
/// else before the last `@`, are dropped.
pub fn mask_relay(relay: Option<&str>) -> String {
    match relay.map(str::trim).filter(|relay| !relay.is_empty()) {
        Some(relay) => relay.rsplit('@').next().unwrap_or(relay).to_string(),
        None => "direct".to_string(),
    }
}

/// Empty means no relay; `socks5://` is upgraded so DNS resolves through the relay.
pub(crate) fn normalize_relay(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.strip_prefix("socks5://") {
        Some(rest) => Some(format!("socks5h://{rest}")),
        None => Some(raw.to_string()),
    }
}
