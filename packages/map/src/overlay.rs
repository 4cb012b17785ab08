//! Ownership of the POI markers currently on the map.

use peak_motion_poi_models::Poi;

use crate::{MapSurface, Marker, MarkerId};

/// Tracks every POI marker it has placed and replaces the whole set on
/// each redraw. There is no incremental diffing: a redraw always clears
/// first.
#[derive(Debug, Default)]
pub struct MapOverlayManager {
    markers: Vec<MarkerId>,
}

impl MapOverlayManager {
    /// Creates a manager with no markers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes every tracked marker from `surface`.
    pub fn clear(&mut self, surface: &mut dyn MapSurface) {
        if !self.markers.is_empty() {
            log::debug!("Clearing {} POI marker(s)", self.markers.len());
        }
        for id in self.markers.drain(..) {
            surface.remove_marker(id);
        }
    }

    /// Replaces the tracked markers with one marker per POI.
    pub fn redraw(&mut self, surface: &mut dyn MapSurface, pois: &[Poi]) {
        self.clear(surface);
        self.markers.extend(
            pois.iter()
                .map(|poi| surface.add_marker(Marker::for_poi(poi))),
        );
        log::debug!("Drew {} POI marker(s)", self.markers.len());
    }

    /// Handles of the markers currently drawn.
    #[must_use]
    pub fn markers(&self) -> &[MarkerId] {
        &self.markers
    }
}
