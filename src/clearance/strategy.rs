//! Acquisition strategy table.
//!
//! Each row pairs a browser profile with the endpoints visited, in order,
//! until the clearance cookie shows up. Rows are sorted cheapest first.

use crate::config::ServiceEndpoints;
use crate::transport::BrowserProfile;

/// Kind of service endpoint a strategy visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Homepage,
    Asset,
    Health,
}

impl EndpointKind {
    fn resolve(self, endpoints: &ServiceEndpoints) -> String {
        match self {
            EndpointKind::Homepage => endpoints.homepage.clone(),
            EndpointKind::Asset => endpoints.asset.clone(),
            EndpointKind::Health => endpoints.health.clone(),
        }
    }
}

/// One entry of the ordered fallback list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionStrategy {
    pub name: String,
    pub description: String,
    pub profile: BrowserProfile,
    pub endpoints: Vec<String>,
}

impl AcquisitionStrategy {
    pub fn new<I, S>(
        name: impl Into<String>,
        description: impl Into<String>,
        profile: BrowserProfile,
        endpoints: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            description: description.into(),
            profile,
            endpoints: endpoints.into_iter().map(Into::into).collect(),
        }
    }
}

struct StrategyRow {
    name: &'static str,
    description: &'static str,
    profile: BrowserProfile,
    endpoints: &'static [EndpointKind],
}

const PRIMARY_PROFILE: BrowserProfile = BrowserProfile::desktop("chrome133a");

static STRATEGY_TABLE: &[StrategyRow] = &[
    StrategyRow {
        name: "homepage",
        description: "direct homepage fetch",
        profile: PRIMARY_PROFILE,
        endpoints: &[EndpointKind::Homepage],
    },
    StrategyRow {
        name: "static_asset",
        description: "static asset fetch",
        profile: PRIMARY_PROFILE,
        endpoints: &[EndpointKind::Asset],
    },
    StrategyRow {
        name: "api_health",
        description: "lightweight API health check",
        profile: PRIMARY_PROFILE,
        endpoints: &[EndpointKind::Health],
    },
    StrategyRow {
        name: "homepage_then_asset",
        description: "homepage followed by static asset",
        profile: PRIMARY_PROFILE,
        endpoints: &[EndpointKind::Homepage, EndpointKind::Asset],
    },
    StrategyRow {
        name: "mobile_safari",
        description: "mobile Safari profile against the homepage",
        profile: BrowserProfile::mobile("safari18_0_ios"),
        endpoints: &[EndpointKind::Homepage],
    },
    StrategyRow {
        name: "chrome_131",
        description: "older desktop Chrome profile against the homepage",
        profile: BrowserProfile::desktop("chrome131"),
        endpoints: &[EndpointKind::Homepage],
    },
    StrategyRow {
        name: "chrome_124_full_poll",
        description: "older desktop Chrome profile polling every endpoint kind",
        profile: BrowserProfile::desktop("chrome124"),
        endpoints: &[EndpointKind::Homepage, EndpointKind::Asset, EndpointKind::Health],
    },
];

/// Built-in strategies resolved against the service endpoints.
pub fn default_strategies(endpoints: &ServiceEndpoints) -> Vec<AcquisitionStrategy> {
    STRATEGY_TABLE
        .iter()
        .map(|row| AcquisitionStrategy {
            name: row.name.to_string(),
            description: row.description.to_string(),
            profile: row.profile.clone(),
            endpoints: row
                .endpoints
                .iter()
                .map(|kind| kind.resolve(endpoints))
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ProfileFamily;

    #[test]
    fn default_order_is_stable() {
        let names: Vec<_> = default_strategies(&ServiceEndpoints::default())
            .into_iter()
            .map(|strategy| strategy.name)
            .collect();
        assert_eq!(
            names,
            [
                "homepage",
                "static_asset",
                "api_health",
                "homepage_then_asset",
                "mobile_safari",
                "chrome_131",
                "chrome_124_full_poll",
            ]
        );
    }

    #[test]
    fn full_poll_visits_every_endpoint_kind() {
        let endpoints = ServiceEndpoints::default();
        let strategies = default_strategies(&endpoints);
        let last = strategies.last().unwrap();
        assert_eq!(
            last.endpoints,
            vec![endpoints.homepage.clone(), endpoints.asset.clone(), endpoints.health.clone()]
        );
        assert_eq!(strategies[4].profile.family, ProfileFamily::MobileSafari);
    }
}
