//! Time-bounded record of events that already produced a row.
//!
//! Entries live in memory only and expire a fixed retention window after they
//! were marked. A restart forgets everything, so a redelivery that arrives after
//! a restart can be recorded twice.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::event::EventId;

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// Source of the current instant, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// What the pipeline needs from a dedup store. A durable implementation can
/// replace [`DedupCache`] without touching the pipeline.
pub trait ProcessedEvents: Send + Sync {
    fn is_processed(&self, event_id: &EventId) -> bool;
    fn mark_processed(&self, event_id: &EventId);
}

pub struct DedupCache {
    retention: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<EventId, Instant>>,
}

impl DedupCache {
    pub fn new(retention: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            retention,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_system_clock(retention: Duration) -> Self {
        Self::new(retention, Arc::new(SystemClock))
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EventId, Instant>> {
        // The map stays consistent even if a holder panicked mid-call.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record `event_id` as handled now. Re-inserting restarts its window.
    pub fn insert(&self, event_id: EventId) {
        let now = self.clock.now();
        self.lock().insert(event_id, now);
    }

    /// True while the entry is younger than the retention window.
    pub fn contains(&self, event_id: &EventId) -> bool {
        let now = self.clock.now();
        match self.lock().get(event_id) {
            Some(marked_at) => now.saturating_duration_since(*marked_at) < self.retention,
            None => false,
        }
    }

    /// Drop expired entries; returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let retention = self.retention;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, marked_at| now.saturating_duration_since(*marked_at) < retention);
        let removed = before - entries.len();
        if removed > 0 {
            debug!("dedup sweep removed {} expired entries", removed);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProcessedEvents for DedupCache {
    fn is_processed(&self, event_id: &EventId) -> bool {
        self.contains(event_id)
    }

    fn mark_processed(&self, event_id: &EventId) {
        self.insert(event_id.clone());
    }
}
