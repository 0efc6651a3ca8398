//! Event Bus - in-process fan-out of call outcomes.
//!
//! Built on `tokio::sync::broadcast`: the buffer is bounded, publishing never
//! blocks, and a subscriber that falls behind loses its oldest events
//! (reported as a lag) instead of stalling producers.

use tokio::sync::broadcast;
use tracing::debug;

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Multi-producer, multi-subscriber event broadcaster.
#[derive(Debug, Clone)]
pub struct EventBus<T: Clone> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventBus<T> {
    /// Create a bus buffering up to `capacity` events (at least one).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to every current subscriber.
    ///
    /// Returns how many subscribers received it; zero is not an error.
    pub fn publish(&self, event: T) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("Event published with no subscribers");
                0
            }
        }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn test_every_subscriber_receives() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        assert_eq!(bus.publish("hello".to_string()), 2);
        assert_eq!(first.recv().await.unwrap(), "hello");
        assert_eq!(second.recv().await.unwrap(), "hello");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus: EventBus<u32> = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(1), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let bus = EventBus::new(2);
        let mut slow = bus.subscribe();

        for i in 0..5u32 {
            bus.publish(i);
        }

        assert!(matches!(slow.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(slow.recv().await.unwrap(), 3);
        assert_eq!(slow.recv().await.unwrap(), 4);
    }
}
