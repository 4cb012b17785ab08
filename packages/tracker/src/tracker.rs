//! Turning provider fixes into channel coordinates.

use std::sync::Arc;

use futures::StreamExt as _;
use futures::stream::BoxStream;
use peak_motion_poi_models::Coordinate;

use crate::channel::CoordinatePublisher;
use crate::provider::{LocationProvider, PermissionState, PositionOptions};
use crate::LocationError;

/// Drives a [`LocationProvider`] and publishes its positions.
pub struct PositionTracker {
    provider: Arc<dyn LocationProvider>,
    publisher: CoordinatePublisher,
    options: PositionOptions,
}

impl PositionTracker {
    /// Creates a tracker that publishes into `publisher`.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        publisher: CoordinatePublisher,
        options: PositionOptions,
    ) -> Self {
        Self {
            provider,
            publisher,
            options,
        }
    }

    /// Makes sure location access is granted, asking the user if needed.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::PermissionDenied`] if access is still not
    /// granted after asking, or the provider's error if it cannot be
    /// queried.
    pub async fn ensure_permission(&self) -> Result<(), LocationError> {
        let state = self.provider.check_permissions().await?;
        if state == PermissionState::Granted {
            return Ok(());
        }

        log::info!("Location permission is {state}, requesting access");
        match self.provider.request_permissions().await? {
            PermissionState::Granted => Ok(()),
            state => {
                log::warn!("Location permission not granted ({state})");
                Err(LocationError::PermissionDenied)
            }
        }
    }

    /// Streams every fix from the provider as a coordinate.
    ///
    /// Unless `manual_override` is set, each coordinate is also published
    /// to the coordinate channel. The first provider error is yielded and
    /// ends the stream; call `stream` again to resubscribe.
    #[must_use]
    pub fn stream(&self, manual_override: bool) -> BoxStream<'static, Result<Coordinate, LocationError>> {
        let mut fixes = self.provider.watch_position(&self.options);
        let publisher = self.publisher.clone();

        Box::pin(async_stream::stream! {
            while let Some(fix) = fixes.next().await {
                match fix {
                    Ok(fix) => {
                        if !manual_override {
                            publisher.publish(fix.coordinate);
                        }
                        yield Ok(fix.coordinate);
                    }
                    Err(e) => {
                        log::warn!("Location stream terminated: {e}");
                        yield Err(e);
                        break;
                    }
                }
            }
        })
    }

    /// Returns a single position, for initial map centering.
    ///
    /// # Errors
    ///
    /// Returns the provider's [`LocationError`].
    pub async fn current_position(&self) -> Result<Coordinate, LocationError> {
        Ok(self.provider.current_position(&self.options).await?.coordinate)
    }

    /// Publishes `position` directly, bypassing the provider.
    pub fn set_manual(&self, position: Coordinate) {
        log::debug!("Manual position {position}");
        self.publisher.publish(position);
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures::StreamExt as _;

    use super::*;
    use crate::channel::coordinate_channel;
    use crate::provider::Fix;

    struct ScriptedProvider {
        fixes: Vec<Result<Fix, LocationError>>,
        checked: PermissionState,
        requested: PermissionState,
    }

    impl ScriptedProvider {
        fn with_fixes(fixes: Vec<Result<Fix, LocationError>>) -> Arc<Self> {
            Arc::new(Self {
                fixes,
                checked: PermissionState::Granted,
                requested: PermissionState::Granted,
            })
        }

        fn with_permissions(checked: PermissionState, requested: PermissionState) -> Arc<Self> {
            Arc::new(Self {
                fixes: Vec::new(),
                checked,
                requested,
            })
        }
    }

    #[async_trait]
    impl LocationProvider for ScriptedProvider {
        async fn check_permissions(&self) -> Result<PermissionState, LocationError> {
            Ok(self.checked)
        }

        async fn request_permissions(&self) -> Result<PermissionState, LocationError> {
            Ok(self.requested)
        }

        async fn current_position(&self, _options: &PositionOptions) -> Result<Fix, LocationError> {
            self.fixes
                .first()
                .cloned()
                .unwrap_or(Err(LocationError::Timeout))
        }

        fn watch_position(
            &self,
            _options: &PositionOptions,
        ) -> BoxStream<'static, Result<Fix, LocationError>> {
            futures::stream::iter(self.fixes.clone()).boxed()
        }
    }

    fn fix(lat: f64, lon: f64) -> Result<Fix, LocationError> {
        Ok(Fix::now(Coordinate::new(lat, lon)))
    }

    #[tokio::test]
    async fn stream_publishes_fixes() {
        let (publisher, mut subscriber) = coordinate_channel();
        let tracker = PositionTracker::new(
            ScriptedProvider::with_fixes(vec![fix(1.0, 1.0), fix(2.0, 2.0)]),
            publisher,
            PositionOptions::default(),
        );

        let items: Vec<_> = tracker.stream(false).collect().await;
        assert_eq!(items.len(), 2);
        assert_eq!(subscriber.next().await, Some(Coordinate::new(2.0, 2.0)));
    }

    #[tokio::test]
    async fn manual_override_keeps_fixes_off_the_channel() {
        let (publisher, mut subscriber) = coordinate_channel();
        let tracker = PositionTracker::new(
            ScriptedProvider::with_fixes(vec![fix(1.0, 1.0), fix(2.0, 2.0)]),
            publisher,
            PositionOptions::default(),
        );

        let items: Vec<_> = tracker.stream(true).collect().await;
        assert_eq!(items, vec![Ok(Coordinate::new(1.0, 1.0)), Ok(Coordinate::new(2.0, 2.0))]);

        tracker.set_manual(Coordinate::new(9.0, 9.0));
        assert_eq!(subscriber.next().await, Some(Coordinate::new(9.0, 9.0)));
    }

    #[tokio::test]
    async fn first_error_ends_stream() {
        let (publisher, _subscriber) = coordinate_channel();
        let tracker = PositionTracker::new(
            ScriptedProvider::with_fixes(vec![
                fix(1.0, 1.0),
                Err(LocationError::Timeout),
                fix(2.0, 2.0),
            ]),
            publisher,
            PositionOptions::default(),
        );

        let items: Vec<_> = tracker.stream(false).collect().await;
        assert_eq!(items, vec![Ok(Coordinate::new(1.0, 1.0)), Err(LocationError::Timeout)]);
    }

    #[tokio::test]
    async fn current_position_uses_provider() {
        let (publisher, _subscriber) = coordinate_channel();
        let tracker = PositionTracker::new(
            ScriptedProvider::with_fixes(vec![fix(5.0, 6.0)]),
            publisher,
            PositionOptions::default(),
        );
        assert_eq!(tracker.current_position().await, Ok(Coordinate::new(5.0, 6.0)));
    }

    #[tokio::test]
    async fn permission_is_requested_when_not_granted() {
        let (publisher, _subscriber) = coordinate_channel();
        let granted_on_request = PositionTracker::new(
            ScriptedProvider::with_permissions(PermissionState::Prompt, PermissionState::Granted),
            publisher.clone(),
            PositionOptions::default(),
        );
        assert_eq!(granted_on_request.ensure_permission().await, Ok(()));

        let refused = PositionTracker::new(
            ScriptedProvider::with_permissions(PermissionState::Prompt, PermissionState::Denied),
            publisher,
            PositionOptions::default(),
        );
        assert_eq!(
            refused.ensure_permission().await,
            Err(LocationError::PermissionDenied)
        );
    }
}
