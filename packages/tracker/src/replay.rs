//! A [`LocationProvider`] that replays a recorded route.
//!
//! Routes are CSV files with `latitude` and `longitude` columns:
//!
//! ```text
//! latitude,longitude
//! 33.6396965,-84.4304574
//! 33.6405000,-84.4290000
//! ```

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use peak_motion_poi_models::Coordinate;
use serde::Deserialize;

use crate::LocationError;
use crate::provider::{Fix, LocationProvider, PermissionState, PositionOptions};

#[derive(Debug, Deserialize)]
struct RouteRow {
    latitude: f64,
    longitude: f64,
}

/// Replays a fixed list of coordinates, one every `interval`.
#[derive(Debug, Clone)]
pub struct ReplayLocationProvider {
    route: Vec<Coordinate>,
    interval: Duration,
    permission: PermissionState,
}

impl ReplayLocationProvider {
    /// Creates a provider that replays `route`.
    #[must_use]
    pub const fn new(route: Vec<Coordinate>, interval: Duration) -> Self {
        Self {
            route,
            interval,
            permission: PermissionState::Granted,
        }
    }

    /// Reads a route from CSV.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::Replay`] if a row cannot be parsed or the
    /// route is empty.
    pub fn from_csv_reader(reader: impl Read, interval: Duration) -> Result<Self, LocationError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let route = csv_reader
            .deserialize::<RouteRow>()
            .map(|row| {
                row.map(|row| Coordinate::new(row.latitude, row.longitude))
                    .map_err(|e| LocationError::Replay {
                        message: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if route.is_empty() {
            return Err(LocationError::Replay {
                message: "route has no positions".to_string(),
            });
        }

        log::debug!("Loaded route with {} position(s)", route.len());
        Ok(Self::new(route, interval))
    }

    /// Reads a route from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::Replay`] if the file cannot be opened or
    /// parsed.
    pub fn from_csv_path(path: &Path, interval: Duration) -> Result<Self, LocationError> {
        let file = std::fs::File::open(path).map_err(|e| LocationError::Replay {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_csv_reader(file, interval)
    }

    /// Reports `permission` from both permission queries.
    #[must_use]
    pub fn with_permission(mut self, permission: PermissionState) -> Self {
        self.permission = permission;
        self
    }

    /// The recorded positions.
    #[must_use]
    pub fn route(&self) -> &[Coordinate] {
        &self.route
    }
}

#[async_trait]
impl LocationProvider for ReplayLocationProvider {
    async fn check_permissions(&self) -> Result<PermissionState, LocationError> {
        Ok(self.permission)
    }

    async fn request_permissions(&self) -> Result<PermissionState, LocationError> {
        Ok(self.permission)
    }

    async fn current_position(&self, _options: &PositionOptions) -> Result<Fix, LocationError> {
        if self.permission != PermissionState::Granted {
            return Err(LocationError::PermissionDenied);
        }
        self.route
            .first()
            .copied()
            .map(Fix::now)
            .ok_or_else(|| LocationError::Unavailable {
                message: "route is empty".to_string(),
            })
    }

    fn watch_position(
        &self,
        _options: &PositionOptions,
    ) -> BoxStream<'static, Result<Fix, LocationError>> {
        let route = self.route.clone();
        let interval = self.interval;
        let granted = self.permission == PermissionState::Granted;

        Box::pin(async_stream::stream! {
            if granted {
                for (index, coordinate) in route.into_iter().enumerate() {
                    if index > 0 && !interval.is_zero() {
                        tokio::time::sleep(interval).await;
                    }
                    yield Ok(Fix::now(coordinate));
                }
            } else {
                yield Err(LocationError::PermissionDenied);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt as _;

    use super::*;

    const ROUTE: &str = "latitude,longitude\n33.6396965,-84.4304574\n 33.64 , -84.43 \n";

    #[test]
    fn parses_csv_route() {
        let provider = ReplayLocationProvider::from_csv_reader(ROUTE.as_bytes(), Duration::ZERO).unwrap();
        assert_eq!(
            provider.route(),
            &[
                Coordinate::new(33.639_696_5, -84.430_457_4),
                Coordinate::new(33.64, -84.43)
            ]
        );
    }

    #[test]
    fn rejects_bad_rows_and_empty_routes() {
        let bad = "latitude,longitude\nnorth,west\n";
        assert!(matches!(
            ReplayLocationProvider::from_csv_reader(bad.as_bytes(), Duration::ZERO),
            Err(LocationError::Replay { .. })
        ));

        let empty = "latitude,longitude\n";
        assert!(matches!(
            ReplayLocationProvider::from_csv_reader(empty.as_bytes(), Duration::ZERO),
            Err(LocationError::Replay { .. })
        ));
    }

    #[tokio::test]
    async fn replays_every_position_then_ends() {
        let provider = ReplayLocationProvider::new(
            vec![Coordinate::new(1.0, 2.0), Coordinate::new(3.0, 4.0)],
            Duration::from_millis(1),
        );
        let fixes: Vec<_> = provider
            .watch_position(&PositionOptions::default())
            .collect()
            .await;
        let coordinates: Vec<_> = fixes
            .into_iter()
            .map(|fix| fix.unwrap().coordinate)
            .collect();
        assert_eq!(coordinates, vec![Coordinate::new(1.0, 2.0), Coordinate::new(3.0, 4.0)]);
    }

    #[tokio::test]
    async fn denied_permission_fails_the_stream() {
        let provider = ReplayLocationProvider::new(vec![Coordinate::new(1.0, 2.0)], Duration::ZERO)
            .with_permission(PermissionState::Denied);
        let fixes: Vec<_> = provider
            .watch_position(&PositionOptions::default())
            .collect()
            .await;
        assert_eq!(fixes, vec![Err(LocationError::PermissionDenied)]);
        assert_eq!(
            provider.current_position(&PositionOptions::default()).await,
            Err(LocationError::PermissionDenied)
        );
    }
}
