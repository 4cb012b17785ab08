//! Facts service client.
//!
//! The facts service answers `GET {base_url}?lat=..&lon=..&radius=..`
//! with a JSON array of `{ id, name, type, coordinates: [lon, lat], fact }`
//! records.

use async_trait::async_trait;
use peak_motion_poi_models::{Coordinate, FactRecord, Poi, RawPoi};

use crate::retry::{self, RetryPolicy};
use crate::{PoiSource, SourceError, require_center};

/// POI source backed by the facts service.
pub struct FactsSource {
    id: String,
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl FactsSource {
    /// Creates a source querying `base_url`.
    #[must_use]
    pub fn new(id: &str, client: reqwest::Client, base_url: &str) -> Self {
        Self {
            id: id.to_string(),
            client,
            base_url: base_url.to_string(),
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

/// Parses a facts service response. A `null` body reads as no records.
///
/// # Errors
///
/// Returns [`SourceError`] if the body is neither an array nor `null`.
/// Records that cannot be decoded are skipped.
pub fn parse_response(body: serde_json::Value) -> Result<Vec<Poi>, SourceError> {
    let records = match body {
        serde_json::Value::Null => return Ok(Vec::new()),
        serde_json::Value::Array(records) => records,
        _ => {
            return Err(SourceError::Response {
                message: "facts response is not an array".to_string(),
            });
        }
    };

    Ok(records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<FactRecord>(record) {
            Ok(record) => RawPoi::Fact(record).normalize(),
            Err(e) => {
                log::warn!("Skipping malformed facts record: {e}");
                None
            }
        })
        .collect())
}

#[async_trait]
impl PoiSource for FactsSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, center: &Coordinate, radius_meters: u32) -> Result<Vec<Poi>, SourceError> {
        let (lat, lon) = require_center(center)?;
        let params = [
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("radius", radius_meters.to_string()),
        ];

        let body = retry::send_json(&self.retry, || {
            self.client.get(&self.base_url).query(&params)
        })
        .await?;

        let pois = parse_response(body)?;
        log::info!("Facts service returned {} record(s) around {center}", pois.len());
        Ok(pois)
    }
}

#[cfg(test)]
mod tests {
    use peak_motion_poi_models::PoiId;

    use super::*;

    #[test]
    fn parses_records() {
        let body = serde_json::json!([
            {
                "id": 1,
                "name": "Kennesaw Mountain",
                "type": "peak",
                "coordinates": [-84.5779, 33.9831],
                "fact": "Site of an 1864 battle."
            },
            {
                "id": "2",
                "name": "Town Well",
                "type": "well",
                "coordinates": [-84.4, 33.6]
            }
        ]);
        let pois = parse_response(body).unwrap();
        assert_eq!(pois.len(), 2);
        assert_eq!(pois[0].id, PoiId::Int(1));
        assert!((pois[0].latitude - 33.9831).abs() < 1e-9);
        assert_eq!(pois[0].fact.as_deref(), Some("Site of an 1864 battle."));
        assert_eq!(pois[1].id, PoiId::from("2"));
        assert!(pois[1].fact.is_none());
    }

    #[test]
    fn null_body_is_empty() {
        assert!(parse_response(serde_json::Value::Null).unwrap().is_empty());
    }

    #[test]
    fn object_body_is_an_error() {
        let body = serde_json::json!({ "error": "nope" });
        assert!(matches!(parse_response(body), Err(SourceError::Response { .. })));
    }

    #[test]
    fn malformed_records_are_skipped() {
        let body = serde_json::json!([
            { "id": 1, "name": "No coords" },
            { "id": 2, "name": "Spring", "type": "spring", "coordinates": [7.9, 46.5] }
        ]);
        let pois = parse_response(body).unwrap();
        assert_eq!(pois.len(), 1);
        assert_eq!(pois[0].id, PoiId::Int(2));
    }
}
