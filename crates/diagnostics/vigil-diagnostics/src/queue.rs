//! Bounded, insertion-ordered store of events awaiting delivery.

use std::collections::VecDeque;

use uuid::Uuid;

use crate::event::FaultEvent;

/// Default capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Result of recording a failed delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Still queued for the next flush
    Retained {
        /// Failed attempts so far
        retry_count: u32,
    },
    /// Retry budget exhausted; the event has been removed for good
    Dropped(FaultEvent),
    /// The event was no longer queued
    Missing,
}

/// FIFO queue that evicts its oldest entries instead of growing past
/// capacity.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    capacity: usize,
    events: VecDeque<FaultEvent>,
}

impl DeliveryQueue {
    /// Create an empty queue
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity.saturating_add(1)),
        }
    }

    /// Append an event, returning whatever had to be evicted to stay within
    /// capacity (oldest first).
    pub fn enqueue(&mut self, event: FaultEvent) -> Vec<FaultEvent> {
        self.events.push_back(event);

        let mut evicted = Vec::new();
        while self.events.len() > self.capacity {
            match self.events.pop_front() {
                Some(oldest) => evicted.push(oldest),
                None => break,
            }
        }
        evicted
    }

    /// Ids in insertion order
    #[must_use]
    pub fn ids(&self) -> Vec<Uuid> {
        self.events.iter().map(FaultEvent::id).collect()
    }

    /// Look up a queued event
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&FaultEvent> {
        self.events.iter().find(|event| event.id() == id)
    }

    /// Whether an event is still queued
    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.get(id).is_some()
    }

    /// Remove an event by id
    pub fn remove(&mut self, id: Uuid) -> Option<FaultEvent> {
        let index = self.events.iter().position(|event| event.id() == id)?;
        self.events.remove(index)
    }

    /// Count a failed attempt; drop the event once `max_retries` is reached.
    pub fn record_failure(&mut self, id: Uuid, max_retries: u32) -> FailureOutcome {
        let Some(index) = self.events.iter().position(|event| event.id() == id) else {
            return FailureOutcome::Missing;
        };

        let retry_count = self.events[index].record_failed_attempt();
        if retry_count < max_retries {
            return FailureOutcome::Retained { retry_count };
        }

        match self.events.remove(index) {
            Some(event) => FailureOutcome::Dropped(event),
            None => FailureOutcome::Missing,
        }
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &FaultEvent> {
        self.events.iter()
    }

    /// Remove everything, returning how many events were discarded
    pub fn clear(&mut self) -> usize {
        let count = self.events.len();
        self.events.clear();
        count
    }

    /// Number of queued events
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Maximum length
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
