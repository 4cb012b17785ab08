//! Slippy-map tile addressing.

use std::f64::consts::PI;

use peak_motion_poi_models::Coordinate;
use serde::{Deserialize, Serialize};

use crate::{EARTH_RADIUS_METERS, deg_to_rad};

/// Latitude limit of the Web Mercator projection.
const MAX_LATITUDE: f64 = 85.051_128_78;

/// A map tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level.
    pub z: u8,
    /// Column, `0..2^z`.
    pub x: u32,
    /// Row, `0..2^z` (north to south).
    pub y: u32,
}

impl TileCoord {
    /// Creates a tile address.
    #[must_use]
    pub const fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }
}

/// Returns the tile containing `(latitude, longitude)` at `zoom`.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn tile_for(latitude: f64, longitude: f64, zoom: u8) -> TileCoord {
    let n = f64::from(1u32 << zoom.min(31));
    let max_index = n - 1.0;

    let lat_rad = deg_to_rad(latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE));
    let x = ((longitude + 180.0) / 360.0 * n).floor().clamp(0.0, max_index);
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n)
        .floor()
        .clamp(0.0, max_index);

    TileCoord::new(zoom, x as u32, y as u32)
}

/// Deepest zoom level tile coverage is computed for.
pub const MAX_ZOOM: u8 = 19;

/// Largest radius tile coverage is computed for.
pub const MAX_COVERING_RADIUS_METERS: f64 = 25_000.0;

/// Returns every tile at `zoom` intersecting the bounding box of a circle
/// of `radius_meters` around `center`.
///
/// `zoom` is capped at [`MAX_ZOOM`] and `radius_meters` is clamped to
/// `0..=`[`MAX_COVERING_RADIUS_METERS`]. Tiles are produced lazily. Yields
/// nothing when `center` is not a valid coordinate.
pub fn tiles_covering(
    center: &Coordinate,
    radius_meters: f64,
    zoom: u8,
) -> impl Iterator<Item = TileCoord> + use<> {
    let zoom = zoom.min(MAX_ZOOM);
    let radius_meters = radius_meters.max(0.0).min(MAX_COVERING_RADIUS_METERS);

    let bounds = center.lat_lon().map(|(lat, lon)| {
        let d_lat = (radius_meters / EARTH_RADIUS_METERS).to_degrees();
        let d_lon = d_lat / deg_to_rad(lat).cos().max(1e-6);
        (
            tile_for(lat + d_lat, lon - d_lon, zoom),
            tile_for(lat - d_lat, lon + d_lon, zoom),
        )
    });

    bounds.into_iter().flat_map(move |(north_west, south_east)| {
        (north_west.x..=south_east.x).flat_map(move |x| {
            (north_west.y..=south_east.y).map(move |y| TileCoord::new(zoom, x, y))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_tile_at_zoom_zero() {
        assert_eq!(tile_for(0.0, 0.0, 0), TileCoord::new(0, 0, 0));
    }

    #[test]
    fn known_tile_for_atlanta() {
        // 33.64, -84.43 at z15 sits in column 8698, row 13129.
        let tile = tile_for(33.639_696_5, -84.430_457_4, 15);
        assert_eq!(tile.z, 15);
        assert_eq!(tile.x, 8698);
        assert_eq!(tile.y, 13129);
    }

    #[test]
    fn edges_are_clamped() {
        let tile = tile_for(89.9, 180.0, 2);
        assert_eq!(tile, TileCoord::new(2, 3, 0));
        let tile = tile_for(-89.9, -180.0, 2);
        assert_eq!(tile, TileCoord::new(2, 0, 3));
    }

    #[test]
    fn covering_contains_center_tile() {
        let center = Coordinate::new(46.5476, 7.9816);
        let tiles: Vec<_> = tiles_covering(&center, 1000.0, 14).collect();
        assert!(tiles.contains(&tile_for(46.5476, 7.9816, 14)));
        assert!(!tiles.is_empty() && tiles.len() <= 9, "{} tiles", tiles.len());
    }

    #[test]
    fn covering_invalid_center_is_empty() {
        assert_eq!(tiles_covering(&Coordinate::unset(), 1000.0, 10).count(), 0);
    }

    #[test]
    fn covering_caps_zoom_and_radius() {
        let center = Coordinate::new(46.5476, 7.9816);
        let mut tiles = tiles_covering(&center, 1_000_000.0, 30);
        assert_eq!(tiles.next().map(|tile| tile.z), Some(MAX_ZOOM));

        let huge = tiles_covering(&center, 1_000_000.0, 12).count();
        let capped = tiles_covering(&center, MAX_COVERING_RADIUS_METERS, 12).count();
        assert_eq!(huge, capped);

        assert_eq!(tiles_covering(&center, f64::NAN, 12).count(), 1);
    }
}
