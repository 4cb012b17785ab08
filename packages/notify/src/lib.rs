#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Notifications raised when a refresh discovers new POIs.
//!
//! The refresh controller only knows [`NotificationDispatcher`]: it reports
//! how many new POIs were found and moves on. Dispatchers never fail from
//! the caller's point of view; delivery problems are logged.
//!
//! Platform backends implement [`NotificationSink`] and are wrapped in a
//! [`SinkDispatcher`], which builds the [`PoiNotification`] and handles
//! errors.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Title of every POI notification.
pub const TITLE: &str = "New places nearby";

/// Errors reported by a [`NotificationSink`].
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The user has not allowed notifications.
    #[error("Notification permission denied")]
    PermissionDenied,

    /// The platform refused to schedule the notification.
    #[error("Failed to schedule notification: {message}")]
    Schedule {
        /// Platform-specific cause.
        message: String,
    },
}

/// A local notification announcing newly discovered POIs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoiNotification {
    /// Unique id (creation time in milliseconds).
    pub id: i64,
    /// Title line.
    pub title: String,
    /// Body text.
    pub body: String,
    /// When to show it; `None` means immediately.
    pub schedule_at: Option<DateTime<Utc>>,
}

impl PoiNotification {
    /// Builds the notification for `count` new POIs, shown immediately.
    #[must_use]
    pub fn for_count(count: usize) -> Self {
        Self {
            id: Utc::now().timestamp_millis(),
            title: TITLE.to_string(),
            body: format!("You discovered {count} new place(s)!"),
            schedule_at: None,
        }
    }

    /// Delays the notification by `delay` from now.
    #[must_use]
    pub fn delayed_by(mut self, delay: Duration) -> Self {
        self.schedule_at = Some(Utc::now() + delay);
        self
    }
}

/// Receives the number of newly discovered POIs after a refresh.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Announces `count` new POIs. Called only with `count > 0`.
    async fn send(&self, count: usize);
}

/// A platform notification backend.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Schedules `notification`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] if the platform refuses it.
    async fn schedule(&self, notification: &PoiNotification) -> Result<(), NotifyError>;
}

/// [`NotificationDispatcher`] that schedules through a [`NotificationSink`].
pub struct SinkDispatcher {
    sink: Arc<dyn NotificationSink>,
    delay: Option<Duration>,
}

impl SinkDispatcher {
    /// Dispatches through `sink`, showing notifications immediately.
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink, delay: None }
    }

    /// Delays every notification by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl NotificationDispatcher for SinkDispatcher {
    async fn send(&self, count: usize) {
        let mut notification = PoiNotification::for_count(count);
        if let Some(delay) = self.delay {
            notification = notification.delayed_by(delay);
        }

        match self.sink.schedule(&notification).await {
            Ok(()) => log::debug!("Scheduled notification {}", notification.id),
            Err(e) => log::error!("Failed to notify about {count} new POI(s): {e}"),
        }
    }
}

/// [`NotificationDispatcher`] that writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn send(&self, count: usize) {
        let notification = PoiNotification::for_count(count);
        log::info!("{}: {}", notification.title, notification.body);
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingSink {
        scheduled: Mutex<Vec<PoiNotification>>,
        refuse: bool,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn schedule(&self, notification: &PoiNotification) -> Result<(), NotifyError> {
            if self.refuse {
                return Err(NotifyError::PermissionDenied);
            }
            self.scheduled.lock().await.push(notification.clone());
            Ok(())
        }
    }

    #[test]
    fn body_mentions_count() {
        let notification = PoiNotification::for_count(3);
        assert_eq!(notification.title, "New places nearby");
        assert_eq!(notification.body, "You discovered 3 new place(s)!");
        assert!(notification.schedule_at.is_none());
    }

    #[test]
    fn delay_sets_schedule_in_the_future() {
        let before = Utc::now();
        let notification = PoiNotification::for_count(1).delayed_by(Duration::seconds(5));
        assert!(notification.schedule_at.is_some_and(|at| at > before));
    }

    #[tokio::test]
    async fn sink_dispatcher_schedules_notification() {
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = SinkDispatcher::new(Arc::clone(&sink) as Arc<dyn NotificationSink>)
            .with_delay(Duration::seconds(5));

        dispatcher.send(2).await;

        let scheduled = sink.scheduled.lock().await;
        assert_eq!(scheduled.len(), 1);
        assert_eq!(scheduled[0].body, "You discovered 2 new place(s)!");
        assert!(scheduled[0].schedule_at.is_some());
    }

    #[tokio::test]
    async fn sink_failure_is_swallowed() {
        let sink = Arc::new(RecordingSink {
            refuse: true,
            ..RecordingSink::default()
        });
        SinkDispatcher::new(Arc::clone(&sink) as Arc<dyn NotificationSink>)
            .send(1)
            .await;
        assert!(sink.scheduled.lock().await.is_empty());
    }
}
