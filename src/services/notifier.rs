//! Outbound event delivery to the host

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use crate::models::MapEvent;
use crate::observability::BridgeMetrics;

/// Capacity of the broadcast buffer before slow subscribers start lagging
const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Accepts events for delivery; must not block the session
#[cfg_attr(test, mockall::automock)]
pub trait EventNotifier: Send + Sync {
    fn notify(&self, event: MapEvent);
}

/// Fans events out to every subscriber
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<MapEvent>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_BUFFER)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MapEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl EventNotifier for BroadcastNotifier {
    fn notify(&self, event: MapEvent) {
        BridgeMetrics::global().record_event(event.name);
        if self.tx.send(event).is_err() {
            trace!("No event subscribers");
        }
    }
}

impl<T: EventNotifier + ?Sized> EventNotifier for Arc<T> {
    fn notify(&self, event: MapEvent) {
        (**self).notify(event)
    }
}
