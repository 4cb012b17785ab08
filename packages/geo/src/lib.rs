#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geographic math for proximity gating and tile addressing.
//!
//! Distances use the haversine formula on a spherical Earth of radius
//! [`EARTH_RADIUS_METERS`]. Tile math follows the standard slippy-map
//! (Web Mercator, `z/x/y`) scheme used by `OpenStreetMap` tile servers.

pub mod tile;

use peak_motion_poi_models::Coordinate;

pub use tile::{MAX_COVERING_RADIUS_METERS, MAX_ZOOM, TileCoord, tile_for, tiles_covering};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Converts degrees to radians.
#[must_use]
pub fn deg_to_rad(degrees: f64) -> f64 {
    degrees * (std::f64::consts::PI / 180.0)
}

/// Great-circle distance between two coordinates in meters.
///
/// Returns [`f64::INFINITY`] when either coordinate is missing a
/// component, so that a threshold comparison against an unknown position
/// always reads as "moved far enough".
#[must_use]
pub fn distance_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    let (Some((lat_a, lon_a)), Some((lat_b, lon_b))) = (a.lat_lon(), b.lat_lon()) else {
        return f64::INFINITY;
    };

    let lat1 = deg_to_rad(lat_a);
    let lon1 = deg_to_rad(lon_a);
    let lat2 = deg_to_rad(lat_b);
    let lon2 = deg_to_rad(lon_b);

    let d_lat = lat2 - lat1;
    let d_lon = lon2 - lon1;

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}
