//! The refresh state machine and its run loop.

use std::collections::BTreeSet;
use std::sync::Arc;

use peak_motion_geo::distance_meters;
use peak_motion_map::{MapOverlayManager, MapSurface};
use peak_motion_notify::NotificationDispatcher;
use peak_motion_poi_models::{Coordinate, Poi, PoiId};
use peak_motion_source::{PoiSource, SourceError};
use peak_motion_storage::PoiLedger;
use peak_motion_tracker::CoordinateSubscriber;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{CycleOutcome, RefreshConfig, RefreshError, RefreshState};

/// Runs refresh cycles for incoming coordinates.
///
/// Owns the map overlay: it is the only component that adds or removes
/// POI markers on its surface.
pub struct ProximityRefreshController {
    source: Arc<dyn PoiSource>,
    surface: Box<dyn MapSurface>,
    overlay: MapOverlayManager,
    ledger: PoiLedger,
    notifier: Arc<dyn NotificationDispatcher>,
    config: RefreshConfig,
    last_refresh: Option<Coordinate>,
    state: watch::Sender<RefreshState>,
}

impl ProximityRefreshController {
    /// Creates an idle controller that has never refreshed.
    #[must_use]
    pub fn new(
        source: Arc<dyn PoiSource>,
        surface: Box<dyn MapSurface>,
        ledger: PoiLedger,
        notifier: Arc<dyn NotificationDispatcher>,
        config: RefreshConfig,
    ) -> Self {
        Self {
            source,
            surface,
            overlay: MapOverlayManager::new(),
            ledger,
            notifier,
            config,
            last_refresh: None,
            state: watch::Sender::new(RefreshState::Idle),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> RefreshState {
        *self.state.borrow()
    }

    /// Subscribes to state transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<RefreshState> {
        self.state.subscribe()
    }

    /// Coordinate of the last successful refresh.
    #[must_use]
    pub const fn last_refresh(&self) -> Option<Coordinate> {
        self.last_refresh
    }

    /// The ledger this controller records into.
    #[must_use]
    pub const fn ledger(&self) -> &PoiLedger {
        &self.ledger
    }

    /// The POI markers currently drawn.
    #[must_use]
    pub const fn overlay(&self) -> &MapOverlayManager {
        &self.overlay
    }

    /// Refresh tuning.
    #[must_use]
    pub const fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// Whether `coordinate` should start a cycle.
    ///
    /// Invalid coordinates never do. Otherwise a cycle starts when nothing
    /// has been refreshed yet, when no positive threshold is configured,
    /// or when `coordinate` is at least the threshold away from the last
    /// successful refresh.
    #[must_use]
    pub fn should_refresh(&self, coordinate: &Coordinate) -> bool {
        if !coordinate.is_valid() {
            return false;
        }
        let Some(last) = self.last_refresh else {
            return true;
        };
        match self.config.threshold_meters {
            Some(threshold) if threshold > 0.0 => distance_meters(&last, coordinate) >= threshold,
            _ => true,
        }
    }

    /// Runs a cycle for `coordinate` if it passes [`Self::should_refresh`].
    ///
    /// Returns `None` when the coordinate was ignored.
    pub async fn handle_coordinate(&mut self, coordinate: Coordinate) -> Option<CycleOutcome> {
        if !self.accepts(&coordinate) {
            return None;
        }
        self.begin_fetch(&coordinate);
        let result = self
            .source
            .fetch(&coordinate, self.config.radius_meters)
            .await;
        Some(self.finish(coordinate, result).await)
    }

    /// Moves the controller onto a tokio task fed by `subscriber`.
    ///
    /// The loop ends when the channel closes or the handle shuts it down.
    #[must_use]
    pub fn spawn(self, subscriber: CoordinateSubscriber) -> RefreshHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(subscriber, shutdown_rx));
        RefreshHandle { shutdown, task }
    }

    async fn run(
        mut self,
        mut subscriber: CoordinateSubscriber,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self {
        log::info!("Proximity refresh started");

        loop {
            let coordinate = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                next = subscriber.next() => {
                    let Some(coordinate) = next else {
                        log::info!("Coordinate channel closed");
                        break;
                    };
                    coordinate
                }
            };

            if !self.accepts(&coordinate) {
                continue;
            }
            self.begin_fetch(&coordinate);

            // The fetch runs on its own task so shutdown does not wait for
            // it; its result is dropped if shutdown wins.
            let source = Arc::clone(&self.source);
            let radius = self.config.radius_meters;
            let fetch = tokio::spawn(async move { source.fetch(&coordinate, radius).await });

            let result = tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    log::info!("Shutting down with a fetch in flight, discarding its results");
                    break;
                }
                joined = fetch => joined.unwrap_or_else(|e| {
                    Err(SourceError::Response {
                        message: format!("fetch task failed: {e}"),
                    })
                }),
            };

            self.finish(coordinate, result).await;
        }

        self.state.send_replace(RefreshState::Idle);
        log::info!("Proximity refresh stopped");
        self
    }

    fn accepts(&self, coordinate: &Coordinate) -> bool {
        if !coordinate.is_valid() {
            log::debug!("Ignoring invalid coordinate {coordinate}");
            return false;
        }
        if !self.should_refresh(coordinate) {
            log::trace!("Coordinate {coordinate} is within the refresh threshold");
            return false;
        }
        true
    }

    fn begin_fetch(&mut self, coordinate: &Coordinate) {
        self.state.send_replace(RefreshState::Fetching);
        log::debug!("Refreshing POIs around {coordinate}");
        self.overlay.clear(self.surface.as_mut());
    }

    async fn finish(
        &mut self,
        coordinate: Coordinate,
        result: Result<Vec<Poi>, SourceError>,
    ) -> CycleOutcome {
        let outcome = match result {
            Ok(pois) => {
                let outcome = self.apply(&pois).await;
                self.last_refresh = Some(coordinate);
                self.state.send_replace(RefreshState::Applied);
                outcome
            }
            Err(e) => {
                log::error!(
                    "Error fetching POIs from {} around {coordinate}: {e}",
                    self.source.id()
                );
                self.state.send_replace(RefreshState::Failed);
                CycleOutcome::Failed
            }
        };
        self.state.send_replace(RefreshState::Idle);
        outcome
    }

    async fn apply(&mut self, pois: &[Poi]) -> CycleOutcome {
        self.overlay.redraw(self.surface.as_mut(), pois);

        let notified = self.ledger.notified_ids().await;
        let new_ids: BTreeSet<PoiId> = pois
            .iter()
            .filter(|poi| !notified.contains(&poi.id))
            .map(|poi| poi.id.clone())
            .collect();

        let newly_notified = new_ids.len();
        let mut visited_total = self.ledger.visited_count();

        if newly_notified > 0 {
            let delta = u64::try_from(newly_notified).unwrap_or(u64::MAX);
            match self.ledger.increment_visited(delta).await {
                Ok(total) => visited_total = total,
                Err(e) => {
                    log::error!("Failed to persist visited count: {e}");
                    visited_total = self.ledger.visited_count();
                }
            }

            self.notifier.send(newly_notified).await;

            if let Err(e) = self.ledger.record_new_ids(&new_ids).await {
                log::error!("Failed to record {newly_notified} new POI id(s): {e}");
            }
            log::info!("Discovered {newly_notified} new POI(s), {visited_total} visited in total");
        }

        CycleOutcome::Applied {
            drawn: pois.len(),
            newly_notified,
            visited_total,
        }
    }
}

/// Handle to a spawned [`ProximityRefreshController`].
///
/// Dropping the handle also stops the loop.
pub struct RefreshHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<ProximityRefreshController>,
}

impl RefreshHandle {
    /// Stops the loop and returns the controller.
    ///
    /// A fetch still in flight is left to finish on its own; its results
    /// are never applied.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::Join`] if the loop task panicked.
    pub async fn shutdown(self) -> Result<ProximityRefreshController, RefreshError> {
        self.shutdown.send_replace(true);
        Ok(self.task.await?)
    }

    /// Waits for the loop to end on its own (the coordinate channel
    /// closing) and returns the controller.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::Join`] if the loop task panicked.
    pub async fn join(self) -> Result<ProximityRefreshController, RefreshError> {
        let Self { shutdown, task } = self;
        let controller = task.await?;
        drop(shutdown);
        Ok(controller)
    }

    /// Whether the loop has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
