//! Compile-time registry of POI service configurations.
//!
//! Each POI provider is defined in a TOML file under `services/`. The
//! registry embeds these at compile time and exposes them via
//! [`all_services`] and [`enabled_services`].

use serde::Deserialize;

/// A POI service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct PoiService {
    /// Unique identifier (e.g., `"overpass"`, `"facts"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this service takes part in refresh cycles.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Selection order; lower values are considered first.
    pub priority: u32,
    /// Provider-specific configuration.
    pub provider: ProviderConfig,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// `OpenStreetMap` Overpass API (tag-based bulk query).
    Overpass {
        /// Interpreter endpoint (e.g., `"https://overpass-api.de/api/interpreter"`).
        base_url: String,
        /// Server-side query timeout in seconds (`[timeout:N]`).
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u32,
    },
    /// Facts service returning POIs with trivia.
    Facts {
        /// Endpoint accepting `lat`, `lon` and `radius` query parameters.
        base_url: String,
    },
}

const fn default_true() -> bool {
    true
}

const fn default_timeout_secs() -> u32 {
    25
}

impl PoiService {
    /// Returns the provider's base URL regardless of variant.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::Overpass { base_url, .. } | ProviderConfig::Facts { base_url } => {
                base_url
            }
        }
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const SERVICE_TOMLS: &[(&str, &str)] = &[
    ("overpass", include_str!("../services/overpass.toml")),
    ("facts", include_str!("../services/facts.toml")),
];

#[cfg(test)]
const EXPECTED_SERVICE_COUNT: usize = 2;

/// Returns all POI service configurations (enabled and disabled).
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded and covered by tests).
#[must_use]
pub fn all_services() -> Vec<PoiService> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse POI service '{name}': {e}"))
        })
        .collect()
}

/// Returns only enabled services, sorted by priority (ascending).
#[must_use]
pub fn enabled_services() -> Vec<PoiService> {
    let mut services: Vec<PoiService> = all_services().into_iter().filter(|s| s.enabled).collect();
    services.sort_by_key(|s| s.priority);
    services
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn loads_all_services() {
        assert_eq!(all_services().len(), EXPECTED_SERVICE_COUNT);
    }

    #[test]
    fn service_ids_are_unique() {
        let services = all_services();
        let mut seen = BTreeSet::new();
        for svc in &services {
            assert!(seen.insert(&svc.id), "Duplicate service ID: {}", svc.id);
        }
    }

    #[test]
    fn all_services_have_required_fields() {
        for svc in &all_services() {
            assert!(!svc.id.is_empty(), "Service has empty id");
            assert!(!svc.name.is_empty(), "Service {} has empty name", svc.id);
            assert!(!svc.base_url().is_empty(), "Service {} has empty base_url", svc.id);
        }
    }

    #[test]
    fn overpass_is_enabled_by_default() {
        let enabled = enabled_services();
        assert!(enabled.iter().any(|s| s.id == "overpass"));
        for window in enabled.windows(2) {
            assert!(window[0].priority <= window[1].priority);
        }
    }
}
