#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Position tracking.
//!
//! A [`provider::LocationProvider`] wraps the device (or a recorded
//! route). The [`PositionTracker`] turns its fixes into coordinates and
//! feeds them, together with manual overrides, into the single-slot
//! [`channel`] the refresh controller consumes.

pub mod channel;
pub mod provider;
pub mod replay;
pub mod tracker;

use thiserror::Error;

pub use channel::{CoordinatePublisher, CoordinateSubscriber, coordinate_channel};
pub use provider::{Fix, LocationProvider, PermissionState, PositionOptions};
pub use replay::ReplayLocationProvider;
pub use tracker::PositionTracker;

/// Errors reported by location providers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The user refused location access.
    #[error("Location permission denied")]
    PermissionDenied,

    /// No fix arrived within the configured timeout.
    #[error("Timed out waiting for a position")]
    Timeout,

    /// The provider cannot produce positions.
    #[error("Position unavailable: {message}")]
    Unavailable {
        /// Provider-specific cause.
        message: String,
    },

    /// A recorded route could not be read.
    #[error("Route replay error: {message}")]
    Replay {
        /// Description of the problem.
        message: String,
    },
}
