#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Point-of-interest sources.
//!
//! Each provider implements the [`PoiSource`] trait: given a center and a
//! radius it queries its remote API and normalizes whatever shape comes
//! back into canonical [`Poi`] records.
//!
//! - [`overpass::OverpassSource`]: tag-based bulk query against the
//!   `OpenStreetMap` Overpass API.
//! - [`facts::FactsSource`]: the facts service, which returns POIs with
//!   trivia attached.
//! - [`join::FactJoinSource`]: a primary source with facts left-joined on
//!   by identifier.
//!
//! Which of these is used is decided by the embedded
//! [`service_registry`] and assembled by [`build_source`].

pub mod facts;
pub mod join;
pub mod overpass;
pub mod retry;
pub mod service_registry;

use std::sync::Arc;

use async_trait::async_trait;
use peak_motion_poi_models::{Coordinate, Poi};

use crate::service_registry::{PoiService, ProviderConfig};

/// Errors that can occur during POI source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Unexpected status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Description of the failure.
        message: String,
    },

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response parsed but did not have the expected shape.
    #[error("Unexpected response: {message}")]
    Response {
        /// Description of what was wrong.
        message: String,
    },

    /// The query center was missing a component.
    #[error("Invalid query center {center}")]
    InvalidCenter {
        /// The rejected center.
        center: Coordinate,
    },

    /// No usable source is configured.
    #[error("Source configuration error: {message}")]
    Config {
        /// Description of what is missing.
        message: String,
    },
}

/// A remote provider of points of interest.
#[async_trait]
pub trait PoiSource: Send + Sync {
    /// Returns a unique identifier for this source (e.g., `"overpass"`).
    fn id(&self) -> &str;

    /// Fetches every POI within `radius_meters` of `center`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the center is invalid, the request
    /// fails, or the response cannot be normalized.
    async fn fetch(&self, center: &Coordinate, radius_meters: u32) -> Result<Vec<Poi>, SourceError>;
}

/// Fetches from `source`, converting any failure into an empty list.
///
/// The failure is logged; callers see "no POIs this time".
pub async fn fetch_or_empty(
    source: &dyn PoiSource,
    center: &Coordinate,
    radius_meters: u32,
) -> Vec<Poi> {
    match source.fetch(center, radius_meters).await {
        Ok(pois) => pois,
        Err(e) => {
            log::error!("Error fetching POIs from {} around {center}: {e}", source.id());
            Vec::new()
        }
    }
}

/// Returns `(latitude, longitude)` of `center` or an
/// [`SourceError::InvalidCenter`].
pub(crate) fn require_center(center: &Coordinate) -> Result<(f64, f64), SourceError> {
    center
        .lat_lon()
        .ok_or(SourceError::InvalidCenter { center: *center })
}

/// Assembles the configured source from the registry entries.
///
/// Enabled services are considered in priority order. The first tag-based
/// service becomes the primary source; an enabled facts service is
/// left-joined onto it, or used alone when no tag-based service is
/// enabled.
///
/// # Errors
///
/// Returns [`SourceError::Config`] if no service is enabled.
pub fn build_source(
    services: &[PoiService],
    client: &reqwest::Client,
) -> Result<Arc<dyn PoiSource>, SourceError> {
    let mut enabled: Vec<&PoiService> = services.iter().filter(|s| s.enabled).collect();
    enabled.sort_by_key(|s| s.priority);

    let mut primary: Option<Arc<dyn PoiSource>> = None;
    let mut facts: Option<Arc<dyn PoiSource>> = None;

    for service in enabled {
        match &service.provider {
            ProviderConfig::Overpass {
                base_url,
                timeout_secs,
            } if primary.is_none() => {
                primary = Some(Arc::new(overpass::OverpassSource::new(
                    &service.id,
                    client.clone(),
                    base_url,
                    *timeout_secs,
                )));
            }
            ProviderConfig::Facts { base_url } if facts.is_none() => {
                facts = Some(Arc::new(facts::FactsSource::new(
                    &service.id,
                    client.clone(),
                    base_url,
                )));
            }
            _ => log::debug!("Skipping extra POI service {}", service.id),
        }
    }

    match (primary, facts) {
        (Some(primary), Some(facts)) => {
            log::info!("Using POI source {} with facts from {}", primary.id(), facts.id());
            Ok(Arc::new(join::FactJoinSource::new(primary, facts)))
        }
        (Some(source), None) | (None, Some(source)) => {
            log::info!("Using POI source {}", source.id());
            Ok(source)
        }
        (None, None) => Err(SourceError::Config {
            message: "no POI service is enabled".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    #[async_trait]
    impl PoiSource for Broken {
        fn id(&self) -> &str {
            "broken"
        }

        async fn fetch(&self, _center: &Coordinate, _radius: u32) -> Result<Vec<Poi>, SourceError> {
            Err(SourceError::Response {
                message: "boom".to_string(),
            })
        }
    }

    fn service(id: &str, enabled: bool, priority: u32, provider: ProviderConfig) -> PoiService {
        PoiService {
            id: id.to_string(),
            name: id.to_string(),
            enabled,
            priority,
            provider,
        }
    }

    fn overpass() -> ProviderConfig {
        ProviderConfig::Overpass {
            base_url: "http://localhost/interpreter".to_string(),
            timeout_secs: 5,
        }
    }

    fn facts() -> ProviderConfig {
        ProviderConfig::Facts {
            base_url: "http://localhost/facts".to_string(),
        }
    }

    #[tokio::test]
    async fn fetch_or_empty_swallows_errors() {
        let pois = fetch_or_empty(&Broken, &Coordinate::new(1.0, 1.0), 1000).await;
        assert!(pois.is_empty());
    }

    #[test]
    fn builds_join_when_both_enabled() {
        let client = reqwest::Client::new();
        let services = vec![
            service("facts", true, 2, facts()),
            service("overpass", true, 1, overpass()),
        ];
        let source = build_source(&services, &client).unwrap();
        assert_eq!(source.id(), "overpass+facts");
    }

    #[test]
    fn builds_single_source() {
        let client = reqwest::Client::new();
        let services = vec![
            service("overpass", false, 1, overpass()),
            service("facts", true, 2, facts()),
        ];
        assert_eq!(build_source(&services, &client).unwrap().id(), "facts");
    }

    #[test]
    fn nothing_enabled_is_a_config_error() {
        let client = reqwest::Client::new();
        let services = vec![service("overpass", false, 1, overpass())];
        assert!(matches!(
            build_source(&services, &client),
            Err(SourceError::Config { .. })
        ));
    }
}
