#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! The proximity refresh pipeline.
//!
//! [`ProximityRefreshController`] consumes coordinates and, whenever the
//! user has moved far enough from the last successful refresh, runs one
//! cycle:
//!
//! 1. clear the POI markers and fetch POIs around the coordinate;
//! 2. redraw every fetched POI;
//! 3. diff the result against the [`peak_motion_storage::PoiLedger`];
//! 4. for newly seen POIs, bump the visited counter, notify, and record
//!    their ids.
//!
//! Cycles never overlap: the controller handles one coordinate at a time
//! and the coordinate channel keeps only the latest pending position.

pub mod controller;

use strum_macros::{AsRefStr, Display};
use thiserror::Error;

pub use controller::{ProximityRefreshController, RefreshHandle};

/// Default minimum displacement between refreshes.
pub const DEFAULT_THRESHOLD_METERS: f64 = 100.0;

/// Default POI search radius.
pub const DEFAULT_RADIUS_METERS: u32 = 1000;

/// Refresh tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshConfig {
    /// Minimum distance from the last refresh before refreshing again.
    /// `None` (or a non-positive value) refreshes on every coordinate.
    pub threshold_meters: Option<f64>,
    /// Search radius passed to the POI source.
    pub radius_meters: u32,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            threshold_meters: Some(DEFAULT_THRESHOLD_METERS),
            radius_meters: DEFAULT_RADIUS_METERS,
        }
    }
}

/// Where the controller is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum RefreshState {
    /// Waiting for a coordinate.
    Idle,
    /// A POI fetch is in flight.
    Fetching,
    /// The last cycle succeeded.
    Applied,
    /// The last cycle's fetch failed.
    Failed,
}

/// Result of a refresh cycle that ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The fetch succeeded and its results were applied.
    Applied {
        /// Markers drawn.
        drawn: usize,
        /// POIs seen for the first time.
        newly_notified: usize,
        /// Visited counter after the cycle.
        visited_total: u64,
    },
    /// The fetch failed; nothing was recorded.
    Failed,
}

/// Errors surfaced by the spawned run loop.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The run loop task panicked or was aborted.
    #[error("Refresh task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
