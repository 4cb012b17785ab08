#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate and point-of-interest types.
//!
//! Every POI data provider produces one of the raw record shapes in this
//! crate ([`TaggedElement`] from tag-based bulk queries, [`FactRecord`] from
//! the facts service). Both are wrapped in [`RawPoi`] and normalized into
//! the canonical [`Poi`] before any shared logic sees them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

/// Name used when a source record has no name.
pub const UNNAMED: &str = "Unnamed";

/// Category used when no prioritized tag is present.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// A geographic position as reported by a location provider.
///
/// Either component may be missing (providers can emit partial fixes).
/// Only coordinates for which [`Coordinate::is_valid`] holds take part in
/// distance comparisons or POI queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinate {
    /// Latitude (WGS84), if known.
    pub latitude: Option<f64>,
    /// Longitude (WGS84), if known.
    pub longitude: Option<f64>,
}

impl Coordinate {
    /// Creates a fully specified coordinate.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: Some(latitude),
            longitude: Some(longitude),
        }
    }

    /// A coordinate with neither component set.
    #[must_use]
    pub const fn unset() -> Self {
        Self {
            latitude: None,
            longitude: None,
        }
    }

    /// Returns `(latitude, longitude)` when both components are present
    /// and finite.
    #[must_use]
    pub fn lat_lon(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Some((lat, lon)),
            _ => None,
        }
    }

    /// Whether both components are present and finite.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat_lon().is_some()
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => write!(f, "({lat:.6}, {lon:.6})"),
            (lat, lon) => write!(f, "({lat:?}, {lon:?})"),
        }
    }
}

/// Identifier of a POI as assigned by its source.
///
/// Sources disagree on the identifier type (OSM node IDs are integers,
/// the facts service may return strings), so both are accepted. The
/// serialized form is untagged so persisted identifier lists stay plain
/// JSON arrays such as `[1, 2, "abc"]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PoiId {
    /// Numeric identifier.
    Int(i64),
    /// Textual identifier.
    Text(String),
}

impl fmt::Display for PoiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for PoiId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for PoiId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PoiId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A point of interest normalized to the canonical schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poi {
    /// Source-defined identifier (used for deduplication).
    pub id: PoiId,
    /// Display name.
    pub name: String,
    /// Category (e.g. `"peak"`, `"well"`, `"park"`).
    pub category: String,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Optional trivia attached by the facts service.
    pub fact: Option<String>,
}

impl Poi {
    /// Returns this POI's position as a [`Coordinate`].
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// OSM tag keys that determine a tagged element's category, in priority
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum CategoryTag {
    /// `natural=*` (peaks, springs, trees...)
    Natural,
    /// `leisure=*` (parks, nature reserves...)
    Leisure,
    /// `tourism=*` (viewpoints, alpine huts...)
    Tourism,
}

impl CategoryTag {
    /// All category tags, highest priority first.
    pub const PRIORITY: [Self; 3] = [Self::Natural, Self::Leisure, Self::Tourism];
}

/// Picks the category of a tagged element from the first prioritized tag
/// it carries.
#[must_use]
pub fn category_from_tags(tags: &BTreeMap<String, String>) -> Option<&str> {
    CategoryTag::PRIORITY
        .iter()
        .find_map(|tag| tags.get(tag.as_ref()))
        .map(String::as_str)
}

/// An element returned by a tag-based bulk query (Overpass `out:json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedElement {
    /// OSM element identifier.
    pub id: i64,
    /// Latitude; absent for ways/relations queried without `center`.
    pub lat: Option<f64>,
    /// Longitude; absent for ways/relations queried without `center`.
    pub lon: Option<f64>,
    /// Raw OSM tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// A record returned by the facts service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactRecord {
    /// Identifier shared with the primary source.
    pub id: PoiId,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Category.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// `[longitude, latitude]` (`GeoJSON` order).
    pub coordinates: [f64; 2],
    /// Trivia about the POI.
    #[serde(default)]
    pub fact: Option<String>,
}

/// A raw POI record from any supported source shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RawPoi {
    /// Tag-based record.
    Tagged(TaggedElement),
    /// Facts-service record.
    Fact(FactRecord),
}

impl RawPoi {
    /// Converts the raw record into a canonical [`Poi`].
    ///
    /// Returns `None` for tagged elements without a position.
    #[must_use]
    pub fn normalize(self) -> Option<Poi> {
        match self {
            Self::Tagged(element) => normalize_tagged(element),
            Self::Fact(record) => Some(normalize_fact(record)),
        }
    }
}

fn normalize_tagged(element: TaggedElement) -> Option<Poi> {
    let (Some(latitude), Some(longitude)) = (element.lat, element.lon) else {
        return None;
    };

    let category = category_from_tags(&element.tags)
        .unwrap_or(UNKNOWN_CATEGORY)
        .to_string();
    let name = element
        .tags
        .get("name")
        .filter(|name| !name.is_empty())
        .cloned()
        .unwrap_or_else(|| UNNAMED.to_string());

    Some(Poi {
        id: PoiId::Int(element.id),
        name,
        category,
        latitude,
        longitude,
        fact: None,
    })
}

fn normalize_fact(record: FactRecord) -> Poi {
    let [longitude, latitude] = record.coordinates;

    Poi {
        id: record.id,
        name: non_empty(record.name).unwrap_or_else(|| UNNAMED.to_string()),
        category: non_empty(record.kind).unwrap_or_else(|| UNKNOWN_CATEGORY.to_string()),
        latitude,
        longitude,
        fact: non_empty(record.fact),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
