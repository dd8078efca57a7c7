//! Navigation header presets, one per profile family.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use once_cell::sync::Lazy;

use crate::transport::ProfileFamily;

const DESKTOP_CHROME: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.7",
    ),
    ("accept-language", "zh-CN,zh;q=0.9"),
    ("cache-control", "no-cache"),
    ("pragma", "no-cache"),
    ("upgrade-insecure-requests", "1"),
    (
        "user-agent",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36",
    ),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
];

// Safari does not send the sec-fetch-user hint.
const MOBILE_SAFARI: &[(&str, &str)] = &[
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
    ),
    ("accept-language", "zh-CN,zh-Hans;q=0.9"),
    ("cache-control", "no-cache"),
    ("pragma", "no-cache"),
    ("upgrade-insecure-requests", "1"),
    (
        "user-agent",
        "Mozilla/5.0 (iPhone; CPU iPhone OS 18_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.0 Mobile/15E148 Safari/604.1",
    ),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
];

static DESKTOP_CHROME_HEADERS: Lazy<HeaderMap> = Lazy::new(|| build_preset(DESKTOP_CHROME));
static MOBILE_SAFARI_HEADERS: Lazy<HeaderMap> = Lazy::new(|| build_preset(MOBILE_SAFARI));

fn build_preset(preset: &[(&'static str, &'static str)]) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(preset.len());
    for &(name, value) in preset {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}

/// Headers sent with every request of a strategy using `family`.
pub fn header_preset(family: ProfileFamily) -> HeaderMap {
    match family {
        ProfileFamily::DesktopChrome => DESKTOP_CHROME_HEADERS.clone(),
        ProfileFamily::MobileSafari => MOBILE_SAFARI_HEADERS.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::{
        ACCEPT, ACCEPT_LANGUAGE, CACHE_CONTROL, PRAGMA, UPGRADE_INSECURE_REQUESTS, USER_AGENT,
    };

    #[test]
    fn presets_differ_by_family() {
        let desktop = header_preset(ProfileFamily::DesktopChrome);
        let mobile = header_preset(ProfileFamily::MobileSafari);

        let desktop_ua = desktop.get(USER_AGENT).unwrap().to_str().unwrap();
        let mobile_ua = mobile.get(USER_AGENT).unwrap().to_str().unwrap();
        assert!(desktop_ua.contains("Chrome/133"));
        assert!(mobile_ua.contains("iPhone"));

        assert!(desktop.contains_key("sec-fetch-user"));
        assert!(!mobile.contains_key("sec-fetch-user"));
    }

    #[test]
    fn presets_are_navigation_requests() {
        for family in [ProfileFamily::DesktopChrome, ProfileFamily::MobileSafari] {
            let headers = header_preset(family);
            assert!(headers.get(ACCEPT).unwrap().to_str().unwrap().starts_with("text/html"));
            assert!(headers.contains_key(ACCEPT_LANGUAGE));
            assert_eq!(headers.get(CACHE_CONTROL).unwrap().to_str().unwrap(), "no-cache");
            assert_eq!(headers.get(PRAGMA).unwrap().to_str().unwrap(), "no-cache");
            assert_eq!(headers.get(UPGRADE_INSECURE_REQUESTS).unwrap().to_str().unwrap(), "1");
        }
    }
}
