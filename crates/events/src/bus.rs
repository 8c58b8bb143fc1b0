//! Broadcast fan-out of launch progress.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::types::{Event, EventEnvelope};

/// A full launch emits a few dozen events; a renderer this far behind is lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Totals over everything emitted on a bus and its clones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusStats {
    pub emitted: usize,
    /// Advisory and fatal failures
    pub failures: usize,
}

#[derive(Debug, Default)]
struct Counters {
    emitted: AtomicUsize,
    failures: AtomicUsize,
}

/// Every clone feeds the same subscribers. Receivers see `Closed` once the
/// last clone is dropped, which is how the console knows the run is over.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    counters: Arc<Counters>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            counters: Arc::default(),
        }
    }

    /// Stamp `event` and hand it to every current subscriber.
    ///
    /// Having nobody listening is fine; the event is still counted.
    /// Returns how many subscribers got it.
    pub fn emit(&self, event: Event) -> usize {
        self.counters.emitted.fetch_add(1, Ordering::Relaxed);
        if event.is_failure() {
            self.counters.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.sender.send(EventEnvelope::new(event)).unwrap_or(0)
    }

    /// Events emitted before this call are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    pub fn stats(&self) -> BusStats {
        BusStats {
            emitted: self.counters.emitted.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receivers", &self.sender.receiver_count())
            .field("stats", &self.stats())
            .finish()
    }
}
