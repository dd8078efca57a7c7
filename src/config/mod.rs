//! Settings and configuration module
//!
//! Provides:
//! - Builder-style settings for the clearance acquirer and the proxy pool
//! - Names of the persisted keys shared with the settings store
//! - Timestamp formatting used for every persisted time value

pub mod settings;

use chrono::{DateTime, NaiveDateTime, Utc};

pub use settings::{
    ClearanceSettings, ClearanceSettingsBuilder, ProxyPoolSettings, ServiceEndpoints,
    SettingsError,
};

/// Section holding the service settings in the store.
pub const DEFAULT_SECTION: &str = "grok";

/// Tag carried by the persisted clearance value and never by the in-memory one.
pub const DEFAULT_CLEARANCE_PREFIX: &str = "cf_clearance=";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Persisted key names.
pub mod keys {
    pub const CF_CLEARANCE: &str = "cf_clearance";
    pub const CF_LAST_ERROR: &str = "cf_last_error";
    pub const CF_LAST_ERROR_AT: &str = "cf_last_error_at";
    pub const CF_LAST_SUCCESS_AT: &str = "cf_last_success_at";
    pub const CF_LAST_METHOD: &str = "cf_last_method";
    pub const PROXY_URL: &str = "proxy_url";
    pub const PROXY_POOL_ENABLED: &str = "proxy_pool_enabled";
    pub const PROXY_POOL_PROTOCOL: &str = "proxy_pool_protocol";
    pub const PROXY_POOL_COUNT: &str = "proxy_pool_count";
    pub const PROXY_POOL_AUTO_VALIDATE: &str = "proxy_pool_auto_validate";
    pub const PROXY_POOL_LAST_REFRESH: &str = "proxy_pool_last_refresh";
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Accepts the persisted format and RFC 3339 (hand-edited files).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|at| at.with_timezone(&Utc)))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_round_trip_at_second_precision() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let text = format_timestamp(at);
        assert_eq!(text, "2026-03-14 09:26:53");
        assert_eq!(parse_timestamp(&text), Some(at));
    }

    #[test]
    fn parses_rfc3339_and_ignores_garbage() {
        let at = parse_timestamp("2026-03-14T09:26:53+02:00").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2026, 3, 14, 7, 26, 53).unwrap());
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
