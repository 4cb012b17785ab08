//! The location provider seam.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use peak_motion_poi_models::Coordinate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};

use crate::LocationError;

/// Options passed to the provider for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Oldest cached fix the provider may return.
    pub maximum_age: Duration,
    /// How long to wait for a fix.
    pub timeout: Duration,
    /// Prefer GPS over coarse sources.
    pub enable_high_accuracy: bool,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            maximum_age: Duration::from_millis(3000),
            timeout: Duration::from_millis(10_000),
            enable_high_accuracy: true,
        }
    }
}

/// A single position report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fix {
    /// Reported position.
    pub coordinate: Coordinate,
    /// Horizontal accuracy radius, when known.
    pub accuracy_meters: Option<f64>,
    /// When the fix was taken.
    pub timestamp: DateTime<Utc>,
}

impl Fix {
    /// A fix at `coordinate` taken now, with unknown accuracy.
    #[must_use]
    pub fn now(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            accuracy_meters: None,
            timestamp: Utc::now(),
        }
    }
}

/// Location permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum PermissionState {
    /// Access granted.
    Granted,
    /// Access refused.
    Denied,
    /// Not decided yet; requesting will ask the user.
    Prompt,
}

/// A source of device positions.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Returns the current permission state without prompting.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError`] if the platform cannot be queried.
    async fn check_permissions(&self) -> Result<PermissionState, LocationError>;

    /// Asks the user for location access.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError`] if the platform cannot be queried.
    async fn request_permissions(&self) -> Result<PermissionState, LocationError>;

    /// Returns a single fix.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError`] if no fix can be obtained.
    async fn current_position(&self, options: &PositionOptions) -> Result<Fix, LocationError>;

    /// Starts continuous position updates. An `Err` item is terminal.
    fn watch_position(
        &self,
        options: &PositionOptions,
    ) -> BoxStream<'static, Result<Fix, LocationError>>;
}
