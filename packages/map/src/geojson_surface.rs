//! Headless [`MapSurface`] that exports its contents as `GeoJSON`.
//!
//! Used where no renderer is attached (the CLI, simulations). Clones share
//! state, so one clone can be handed to the refresh controller while
//! another is kept for exporting.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use geojson::{Feature, FeatureCollection, Geometry, JsonObject, feature::Id};

use crate::{MapSurface, Marker, MarkerId, TileLayer};

#[derive(Debug, Default)]
struct SurfaceState {
    next_id: u64,
    markers: BTreeMap<MarkerId, Marker>,
    tile_layers: Vec<TileLayer>,
}

/// A [`MapSurface`] keeping markers in memory.
#[derive(Debug, Clone, Default)]
pub struct GeoJsonSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl GeoJsonSurface {
    /// Creates an empty surface.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SurfaceState> {
        // Every mutation is a single map operation; poisoning is ignored.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Markers currently on the surface, in insertion order.
    #[must_use]
    pub fn markers(&self) -> Vec<Marker> {
        self.lock().markers.values().cloned().collect()
    }

    /// Registered tile layers.
    #[must_use]
    pub fn tile_layers(&self) -> Vec<TileLayer> {
        self.lock().tile_layers.clone()
    }

    /// Exports the markers as a `FeatureCollection` of points. Each
    /// feature carries the POI id, name, category, fact, icon URL and
    /// popup HTML as properties; tile layers go in a `tileLayers` foreign
    /// member.
    #[must_use]
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let state = self.lock();

        let features = state
            .markers
            .iter()
            .map(|(id, marker)| {
                let mut properties = JsonObject::new();
                properties.insert(
                    "poiId".to_string(),
                    serde_json::to_value(&marker.poi_id).unwrap_or_default(),
                );
                properties.insert("name".to_string(), marker.popup.name.clone().into());
                properties.insert("category".to_string(), marker.popup.category.clone().into());
                properties.insert(
                    "fact".to_string(),
                    marker.popup.fact.clone().map_or(serde_json::Value::Null, Into::into),
                );
                properties.insert("icon".to_string(), marker.icon.url.clone().into());
                properties.insert("popup".to_string(), marker.popup.to_html().into());

                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(geojson::Value::Point(vec![
                        marker.longitude,
                        marker.latitude,
                    ]))),
                    id: Some(Id::Number(id.0.into())),
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        let foreign_members = if state.tile_layers.is_empty() {
            None
        } else {
            let mut members = JsonObject::new();
            members.insert(
                "tileLayers".to_string(),
                serde_json::to_value(&state.tile_layers).unwrap_or_default(),
            );
            Some(members)
        };

        FeatureCollection {
            bbox: None,
            features,
            foreign_members,
        }
    }
}

impl MapSurface for GeoJsonSurface {
    fn add_marker(&mut self, marker: Marker) -> MarkerId {
        let mut state = self.lock();
        state.next_id += 1;
        let id = MarkerId(state.next_id);
        state.markers.insert(id, marker);
        id
    }

    fn remove_marker(&mut self, id: MarkerId) {
        if self.lock().markers.remove(&id).is_none() {
            log::trace!("Ignoring removal of unknown marker {id:?}");
        }
    }

    fn add_tile_layer(&mut self, layer: TileLayer) {
        log::debug!("Registered tile layer {}", layer.url_template);
        self.lock().tile_layers.push(layer);
    }
}

#[cfg(test)]
mod tests {
    use peak_motion_poi_models::{Poi, PoiId};

    use super::*;

    fn marker(id: i64, fact: Option<&str>) -> Marker {
        Marker::for_poi(&Poi {
            id: PoiId::Int(id),
            name: format!("poi {id}"),
            category: "well".to_string(),
            latitude: 33.6,
            longitude: -84.4,
            fact: fact.map(String::from),
        })
    }

    #[test]
    fn clones_share_markers() {
        let surface = GeoJsonSurface::new();
        let mut handle = surface.clone();
        let id = handle.add_marker(marker(1, None));
        assert_eq!(surface.markers().len(), 1);
        handle.remove_marker(id);
        assert!(surface.markers().is_empty());
    }

    #[test]
    fn exports_points_in_lon_lat_order() {
        let mut surface = GeoJsonSurface::new();
        surface.add_marker(marker(7, Some("Cold water.")));
        surface.add_tile_layer(TileLayer {
            url_template: "https://{s}.tile.example/{z}/{x}/{y}.png".to_string(),
            subdomains: vec!["a".to_string()],
            attribution: String::new(),
        });

        let collection = surface.to_feature_collection();
        assert_eq!(collection.features.len(), 1);

        let feature = &collection.features[0];
        let Some(geojson::Value::Point(point)) = feature.geometry.as_ref().map(|g| &g.value) else {
            panic!("expected a point geometry");
        };
        assert_eq!(point, &vec![-84.4, 33.6]);

        let properties = feature.properties.as_ref().unwrap();
        assert_eq!(properties["poiId"], serde_json::json!(7));
        assert_eq!(properties["icon"], serde_json::json!("assets/icon/water.svg"));
        assert_eq!(properties["fact"], serde_json::json!("Cold water."));

        let members = collection.foreign_members.as_ref().unwrap();
        assert_eq!(members["tileLayers"].as_array().map(Vec::len), Some(1));
    }
}
