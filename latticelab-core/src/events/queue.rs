use crate::events::event::Event;

/// Time-ordered event sequence, stable across equal times in insertion
/// order.
///
/// Backed by an insertion-sorted `Vec`: per-bar event counts are small and
/// bounded, so linear insertion beats a heap (which would also lose the
/// stability guarantee).
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert after every event scheduled at or before the new event's time.
    pub fn push(&mut self, event: Event) {
        let at = self.events.partition_point(|e| e.time() <= event.time());
        self.events.insert(at, event);
    }

    /// The earliest event, without removing it.
    pub fn peek(&self) -> Option<&Event> {
        self.events.first()
    }

    /// Remove and return the earliest event.
    pub fn pop(&mut self) -> Option<Event> {
        if self.events.is_empty() {
            None
        } else {
            Some(self.events.remove(0))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
