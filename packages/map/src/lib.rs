#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Map surface abstraction and POI marker overlay.
//!
//! The renderer itself is external: anything that can add and remove
//! markers and register a tile layer implements [`MapSurface`]. The
//! [`overlay::MapOverlayManager`] is the only component that places POI
//! markers on a surface.

pub mod geojson_surface;
pub mod icons;
pub mod overlay;

use peak_motion_poi_models::{Poi, PoiId};
use serde::{Deserialize, Serialize};

pub use geojson_surface::GeoJsonSurface;
pub use overlay::MapOverlayManager;

/// Handle to a marker placed on a [`MapSurface`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarkerId(pub u64);

/// An opaque drawable map.
pub trait MapSurface: Send {
    /// Places `marker` on the map and returns its handle.
    fn add_marker(&mut self, marker: Marker) -> MarkerId;

    /// Removes a previously added marker. Unknown handles are ignored.
    fn remove_marker(&mut self, id: MarkerId);

    /// Registers a raster tile layer.
    fn add_tile_layer(&mut self, layer: TileLayer);
}

/// A marker icon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconSpec {
    /// Image URL.
    pub url: String,
    /// `[width, height]` in pixels.
    pub size: [u32; 2],
    /// Pixel of the image placed on the marker position.
    pub anchor: [i32; 2],
    /// Popup offset relative to the anchor.
    pub popup_anchor: [i32; 2],
    /// CSS class applied to the icon.
    pub class_name: String,
}

/// Content of a marker popup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Popup {
    /// POI name.
    pub name: String,
    /// POI category.
    pub category: String,
    /// Optional trivia.
    pub fact: Option<String>,
}

impl Popup {
    /// Renders the popup as the HTML fragment the map shows.
    #[must_use]
    pub fn to_html(&self) -> String {
        let fact = self
            .fact
            .as_ref()
            .map(|fact| format!("<b>Fact:</b> {}", escape_html(fact)))
            .unwrap_or_default();
        format!(
            "<b>{}</b><br><b>Type:</b> {}<br>{fact}",
            escape_html(&self.name),
            escape_html(&self.category),
        )
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// A POI marker ready to be drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// The POI this marker represents.
    pub poi_id: PoiId,
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Icon to draw.
    pub icon: IconSpec,
    /// Popup bound to the marker.
    pub popup: Popup,
}

impl Marker {
    /// Builds the marker for `poi`, choosing its icon by category.
    #[must_use]
    pub fn for_poi(poi: &Poi) -> Self {
        Self {
            poi_id: poi.id.clone(),
            latitude: poi.latitude,
            longitude: poi.longitude,
            icon: icons::icon_for_category(&poi.category),
            popup: Popup {
                name: poi.name.clone(),
                category: poi.category.clone(),
                fact: poi.fact.clone(),
            },
        }
    }
}

/// A raster tile layer registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileLayer {
    /// URL template with `{s}`, `{z}`, `{x}` and `{y}` placeholders.
    pub url_template: String,
    /// Values substituted for `{s}`.
    pub subdomains: Vec<String>,
    /// Attribution HTML.
    pub attribution: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_without_fact() {
        let popup = Popup {
            name: "Eiger".to_string(),
            category: "peak".to_string(),
            fact: None,
        };
        assert_eq!(popup.to_html(), "<b>Eiger</b><br><b>Type:</b> peak<br>");
    }

    #[test]
    fn popup_with_fact_is_escaped() {
        let popup = Popup {
            name: "A & B".to_string(),
            category: "well".to_string(),
            fact: Some("<deep>".to_string()),
        };
        assert_eq!(
            popup.to_html(),
            "<b>A &amp; B</b><br><b>Type:</b> well<br><b>Fact:</b> &lt;deep&gt;"
        );
    }

    #[test]
    fn marker_uses_poi_position_and_icon() {
        let poi = Poi {
            id: PoiId::Int(3),
            name: "Hut".to_string(),
            category: "alpine_hut".to_string(),
            latitude: 46.0,
            longitude: 8.0,
            fact: None,
        };
        let marker = Marker::for_poi(&poi);
        assert_eq!(marker.poi_id, PoiId::Int(3));
        assert!((marker.latitude - 46.0).abs() < f64::EPSILON);
        assert_eq!(marker.icon.url, icons::HIKING_ICON);
    }
}
