//! Event bus
//!
//! Lifecycle events are logged and fanned out to subscribers (the `/events`
//! stream). Publishing never blocks and never fails: with no subscribers the
//! event is dropped after logging.

use gantry_core::event::Event;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub struct EventBus {
    broadcast_channel: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            broadcast_channel: tx,
        }
    }

    /// Returns a receiver for events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.broadcast_channel.subscribe()
    }

    pub fn publish(&self, event: Event) {
        tracing::info!(event = event.name(), payload = ?event, "lifecycle event");

        if let Err(err) = self.broadcast_channel.send(event) {
            tracing::trace!(error = %err, "No receivers available to receive published event");
        }
    }
}
