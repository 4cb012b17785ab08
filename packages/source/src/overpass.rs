//! `OpenStreetMap` Overpass API client.
//!
//! Issues a single Overpass QL query for nodes carrying any of the
//! category tags (`natural`, `leisure`, `tourism`) around the center and
//! normalizes the `out:json` elements into [`Poi`]s.
//!
//! See <https://wiki.openstreetmap.org/wiki/Overpass_API/Overpass_QL>

use async_trait::async_trait;
use peak_motion_poi_models::{CategoryTag, Coordinate, Poi, RawPoi, TaggedElement};

use crate::retry::{self, RetryPolicy};
use crate::{PoiSource, SourceError, require_center};

/// Tag-based POI source backed by an Overpass interpreter endpoint.
pub struct OverpassSource {
    id: String,
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u32,
    retry: RetryPolicy,
}

impl OverpassSource {
    /// Creates a source querying `base_url`.
    #[must_use]
    pub fn new(id: &str, client: reqwest::Client, base_url: &str, timeout_secs: u32) -> Self {
        Self {
            id: id.to_string(),
            client,
            base_url: base_url.to_string(),
            timeout_secs,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Builds the Overpass QL query for every category-tagged node within
/// `radius_meters` of `(latitude, longitude)`.
#[must_use]
pub fn build_query(latitude: f64, longitude: f64, radius_meters: u32, timeout_secs: u32) -> String {
    use std::fmt::Write as _;

    let mut query = format!("[out:json][timeout:{timeout_secs}];(");
    for tag in CategoryTag::PRIORITY {
        let _ = write!(
            query,
            "node[\"{tag}\"](around:{radius_meters},{latitude},{longitude});"
        );
    }
    query.push_str(");out;");
    query
}

/// Parses an Overpass `out:json` response.
///
/// Elements without a position or that cannot be decoded are skipped.
///
/// # Errors
///
/// Returns [`SourceError`] if the body has no `elements` array.
pub fn parse_response(body: serde_json::Value) -> Result<Vec<Poi>, SourceError> {
    let serde_json::Value::Object(mut object) = body else {
        return Err(SourceError::Response {
            message: "Overpass response is not an object".to_string(),
        });
    };

    let elements = match object.remove("elements") {
        Some(serde_json::Value::Array(elements)) => elements,
        _ => {
            return Err(SourceError::Response {
                message: "Overpass response missing 'elements' array".to_string(),
            });
        }
    };

    let total = elements.len();
    let mut pois = Vec::with_capacity(total);
    for element in elements {
        let element: TaggedElement = match serde_json::from_value(element) {
            Ok(element) => element,
            Err(e) => {
                log::warn!("Skipping malformed Overpass element: {e}");
                continue;
            }
        };
        if let Some(poi) = RawPoi::Tagged(element).normalize() {
            pois.push(poi);
        }
    }

    if pois.len() < total {
        log::debug!("Skipped {} unusable Overpass element(s)", total - pois.len());
    }

    Ok(pois)
}

#[async_trait]
impl PoiSource for OverpassSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, center: &Coordinate, radius_meters: u32) -> Result<Vec<Poi>, SourceError> {
        let (lat, lon) = require_center(center)?;
        let query = build_query(lat, lon, radius_meters, self.timeout_secs);
        log::debug!("Overpass query: {query}");

        let body = retry::send_json(&self.retry, || {
            self.client
                .post(&self.base_url)
                .form(&[("data", query.as_str())])
        })
        .await?;

        let pois = parse_response(body)?;
        log::info!("Overpass returned {} POI(s) within {radius_meters}m of {center}", pois.len());
        Ok(pois)
    }
}
