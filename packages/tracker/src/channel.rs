//! The shared coordinate channel.
//!
//! Single slot, latest wins: a coordinate published while the consumer is
//! busy replaces any coordinate it has not read yet. Publishers are
//! cheap to clone; there is exactly one subscriber.

use std::sync::Arc;

use peak_motion_poi_models::Coordinate;
use tokio::sync::watch;

/// Creates a connected publisher/subscriber pair.
#[must_use]
pub fn coordinate_channel() -> (CoordinatePublisher, CoordinateSubscriber) {
    let (sender, receiver) = watch::channel(None);
    (
        CoordinatePublisher {
            sender: Arc::new(sender),
        },
        CoordinateSubscriber { receiver },
    )
}

/// Write half of the coordinate channel.
#[derive(Debug, Clone)]
pub struct CoordinatePublisher {
    sender: Arc<watch::Sender<Option<Coordinate>>>,
}

impl CoordinatePublisher {
    /// Replaces the pending coordinate with `coordinate`.
    ///
    /// Never fails, even when the subscriber is gone.
    pub fn publish(&self, coordinate: Coordinate) {
        self.sender.send_replace(Some(coordinate));
    }

    /// Whether the subscriber has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Read half of the coordinate channel.
#[derive(Debug)]
pub struct CoordinateSubscriber {
    receiver: watch::Receiver<Option<Coordinate>>,
}

impl CoordinateSubscriber {
    /// Waits for the next coordinate.
    ///
    /// Returns the most recent unread coordinate, or `None` once every
    /// publisher is gone and nothing is left to read.
    pub async fn next(&mut self) -> Option<Coordinate> {
        loop {
            if self.receiver.changed().await.is_err() {
                return None;
            }
            if let Some(coordinate) = *self.receiver.borrow_and_update() {
                return Some(coordinate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn latest_coordinate_wins() {
        let (publisher, mut subscriber) = coordinate_channel();
        publisher.publish(Coordinate::new(1.0, 1.0));
        publisher.publish(Coordinate::new(2.0, 2.0));
        publisher.publish(Coordinate::new(3.0, 3.0));

        assert_eq!(subscriber.next().await, Some(Coordinate::new(3.0, 3.0)));
    }

    #[tokio::test]
    async fn pending_value_survives_publisher_drop() {
        let (publisher, mut subscriber) = coordinate_channel();
        let other = publisher.clone();
        other.publish(Coordinate::new(4.0, 5.0));
        drop(publisher);
        drop(other);

        assert_eq!(subscriber.next().await, Some(Coordinate::new(4.0, 5.0)));
        assert_eq!(subscriber.next().await, None);
    }

    #[test]
    fn publisher_sees_closed_subscriber() {
        let (publisher, subscriber) = coordinate_channel();
        assert!(!publisher.is_closed());
        drop(subscriber);
        assert!(publisher.is_closed());
    }
}
