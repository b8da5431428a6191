use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use super::stats::StatAccumulator;

// ─── Probe ───────────────────────────────────────────────────────

/// A named measurement point with independent success and failure tracks.
///
/// Probes are handed out as `Arc<Probe>`; every lookup by the same name
/// resolves to the same allocation.
#[derive(Debug)]
pub struct Probe {
    name: String,
    tracks: Mutex<Tracks>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tracks {
    success: StatAccumulator,
    failure: StatAccumulator,
}

impl Probe {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: Mutex::new(Tracks::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn append_success_time(&self, ms: f64) {
        self.tracks.lock().success.push(ms);
    }

    pub fn append_failure_time(&self, ms: f64) {
        self.tracks.lock().failure.push(ms);
    }

    /// Route one elapsed time to the matching track.
    pub fn append(&self, ms: f64, success: bool) {
        if success {
            self.append_success_time(ms);
        } else {
            self.append_failure_time(ms);
        }
    }

    pub fn clear(&self) {
        let mut t = self.tracks.lock();
        t.success.reset();
        t.failure.reset();
    }

    pub fn success_stats(&self) -> StatAccumulator {
        self.tracks.lock().success
    }

    pub fn failure_stats(&self) -> StatAccumulator {
        self.tracks.lock().failure
    }

    pub fn successes(&self) -> u64 {
        self.tracks.lock().success.count
    }
    pub fn failures(&self) -> u64 {
        self.tracks.lock().failure.count
    }

    pub fn success_min(&self) -> f64 {
        self.tracks.lock().success.min()
    }
    pub fn failure_min(&self) -> f64 {
        self.tracks.lock().failure.min()
    }

    pub fn success_max(&self) -> f64 {
        self.tracks.lock().success.max()
    }
    pub fn failure_max(&self) -> f64 {
        self.tracks.lock().failure.max()
    }

    pub fn success_mean(&self) -> f64 {
        self.tracks.lock().success.mean()
    }
    pub fn failure_mean(&self) -> f64 {
        self.tracks.lock().failure.mean()
    }

    pub fn success_std_dev(&self) -> f64 {
        self.tracks.lock().success.std_dev()
    }
    pub fn failure_std_dev(&self) -> f64 {
        self.tracks.lock().failure.std_dev()
    }

    /// Flatten both tracks into one export row.
    pub fn flat(&self) -> FlatStats {
        let t = *self.tracks.lock();
        FlatStats {
            name: self.name.clone(),
            success_count: t.success.count,
            success_min: t.success.min(),
            success_max: t.success.max(),
            success_mean: t.success.mean(),
            success_std_dev: t.success.std_dev(),
            failure_count: t.failure.count,
            failure_min: t.failure.min(),
            failure_max: t.failure.max(),
            failure_mean: t.failure.mean(),
            failure_std_dev: t.failure.std_dev(),
        }
    }
}

// ─── Export row ──────────────────────────────────────────────────

/// One row of the statistics snapshot. Undefined aggregates are NaN
/// (serialized as `null` in JSON).
#[derive(Debug, Clone, Serialize)]
pub struct FlatStats {
    pub name: String,
    pub success_count: u64,
    pub success_min: f64,
    pub success_max: f64,
    pub success_mean: f64,
    pub success_std_dev: f64,
    pub failure_count: u64,
    pub failure_min: f64,
    pub failure_max: f64,
    pub failure_mean: f64,
    pub failure_std_dev: f64,
}

// ─── Registry ────────────────────────────────────────────────────

/// Name → probe map that remembers first-seen order.
///
/// Not synchronized on its own; the runtime owns it behind its lock.
#[derive(Debug, Default)]
pub struct LogRegistry {
    probes: Vec<Arc<Probe>>,
    index: HashMap<String, usize>,
}

impl LogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, name: &str) -> Arc<Probe> {
        if let Some(&i) = self.index.get(name) {
            return self.probes[i].clone();
        }
        let probe = Arc::new(Probe::new(name));
        self.index.insert(name.to_owned(), self.probes.len());
        self.probes.push(probe.clone());
        probe
    }

    pub fn get(&self, name: &str) -> Option<Arc<Probe>> {
        self.index.get(name).map(|&i| self.probes[i].clone())
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    pub fn snapshot(&self) -> Vec<FlatStats> {
        self.probes.iter().map(|p| p.flat()).collect()
    }

    /// Reset every probe's tracks; names and identities survive.
    pub fn clear_all(&self) {
        for probe in &self.probes {
            probe.clear();
        }
    }
}
