use serde::Serialize;

/// Running statistics for one outcome track of a probe.
///
/// Uses Welford's single-pass update so that no raw samples are kept and
/// the variance stays stable over long accumulations.
/// Reference: <https://en.wikipedia.org/wiki/Algorithms_for_calculating_variance#Welford's_online_algorithm>
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatAccumulator {
    pub count: u64,
    pub mean: f64,
    /// Sum of squared deviations from the running mean
    pub m2: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for StatAccumulator {
    fn default() -> Self {
        Self::empty()
    }
}

impl StatAccumulator {
    /// Zero-sample state. Extrema start at the opposite infinities so the
    /// first observation always replaces them.
    pub const fn empty() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Fold one observation (milliseconds) into the track.
    pub fn push(&mut self, x: f64) {
        let count = self.count + 1;
        self.min = self.min.min(x);
        self.max = self.max.max(x);

        let delta = x - self.mean;
        let mean = self.mean + delta / count as f64;
        self.m2 += delta * (x - mean);

        self.mean = mean;
        self.count = count;
    }

    pub fn reset(&mut self) {
        *self = Self::empty();
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn min(&self) -> f64 {
        if self.is_empty() { f64::NAN } else { self.min }
    }

    pub fn max(&self) -> f64 {
        if self.is_empty() { f64::NAN } else { self.max }
    }

    pub fn mean(&self) -> f64 {
        if self.is_empty() { f64::NAN } else { self.mean }
    }

    /// Sample variance; needs at least two observations.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return f64::NAN;
        }
        self.m2 / (self.count - 1) as f64
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}
