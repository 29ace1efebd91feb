// THEORY:
// Glue between the local occupancy engine and a remote detection backend.
// The backend owns the video and runs detection on its own schedule; this
// crate uploads media, edits the backend's region list, and collects results.
//
// Results arrive two ways: pulled by the `ResultPoller` over REST, or pushed
// through the `EventChannel`. Both publish onto one `ResultBus`, so consumers
// subscribe once and do not care which path delivered an update.

use std::time::SystemTime;

use parking_vision::DetectionPayload;
use tokio::sync::broadcast;

pub mod api;
pub mod events;
pub mod poller;

pub use api::{BackendClient, ClientError};
pub use events::{ChannelEvent, ConnectionStatus, EventChannel};
pub use poller::{PollHandle, ResultPoller};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    Poll,
    Push,
}

#[derive(Debug, Clone)]
pub struct DetectionUpdate {
    pub payload: DetectionPayload,
    pub source: UpdateSource,
    pub received_at: SystemTime,
}

impl DetectionUpdate {
    pub fn new(payload: DetectionPayload, source: UpdateSource) -> Self {
        Self {
            payload,
            source,
            received_at: SystemTime::now(),
        }
    }
}

/// Fan-out of detection results. Slow subscribers lag and skip ahead.
#[derive(Clone)]
pub struct ResultBus {
    pub results_tx: broadcast::Sender<DetectionUpdate>,
}

impl ResultBus {
    pub fn new(capacity: usize) -> Self {
        let (results_tx, _) = broadcast::channel::<DetectionUpdate>(capacity.max(1));
        Self { results_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DetectionUpdate> {
        self.results_tx.subscribe()
    }

    /// Returns the number of subscribers that will see the update.
    pub fn publish(&self, update: DetectionUpdate) -> usize {
        self.results_tx.send(update).unwrap_or(0)
    }
}

impl Default for ResultBus {
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;

    fn payload(free: u32) -> DetectionPayload {
        DetectionPayload {
            image: String::new(),
            free_spaces: free,
            occupied_spaces: 0,
            total_spaces: free,
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let bus = ResultBus::new(4);
        assert_eq!(bus.publish(DetectionUpdate::new(payload(1), UpdateSource::Poll)), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let bus = ResultBus::new(2);
        let mut rx = bus.subscribe();
        for free in 0..5 {
            bus.publish(DetectionUpdate::new(payload(free), UpdateSource::Push));
        }
        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(3))));
        assert_eq!(rx.recv().await.unwrap().payload.free_spaces, 3);
        assert_eq!(rx.recv().await.unwrap().payload.free_spaces, 4);
    }
}
