use std::collections::HashMap;
use std::time::Instant;

use chrono::{DateTime, Utc};

use super::CorrelationId;

/// Bookkeeping for one probe invocation between `begin` and `end`.
#[derive(Debug, Clone)]
pub struct InFlightEntry {
    /// Probe the elapsed time is recorded into. Usually the key itself;
    /// differs when several invocations of one probe overlap.
    pub probe: String,
    pub started_at: DateTime<Utc>,
    pub started: Instant,
    pub correlation_id: Option<CorrelationId>,
}

impl InFlightEntry {
    pub fn start_now(probe: &str, correlation_id: Option<CorrelationId>) -> Self {
        Self {
            probe: probe.to_owned(),
            started_at: Utc::now(),
            started: Instant::now(),
            correlation_id,
        }
    }
}

/// At most one open entry per key. A second `open` for a pending key
/// replaces the earlier entry and hands it back to the caller.
#[derive(Debug, Default)]
pub struct InFlightTracker {
    entries: HashMap<String, InFlightEntry>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the abandoned entry if `key` was already pending.
    pub fn open(&mut self, key: &str, entry: InFlightEntry) -> Option<InFlightEntry> {
        self.entries.insert(key.to_owned(), entry)
    }

    pub fn close(&mut self, key: &str) -> Option<InFlightEntry> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
