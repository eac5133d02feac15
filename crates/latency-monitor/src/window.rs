use crate::sample::Sample;
use std::collections::VecDeque;

/// Bounded FIFO of latency values in milliseconds, oldest first.
///
/// Timeouts never enter the window; once `capacity` is reached every append
/// evicts the oldest value.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    values: VecDeque<f64>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            values: VecDeque::with_capacity(capacity),
        }
    }

    /// Append the sample's latency if it has one
    pub fn append(&mut self, sample: &Sample) {
        if let Some(latency_ms) = sample.latency_ms() {
            self.push(latency_ms);
        }
    }

    /// Bulk-append values in chronological order, e.g. reloaded history
    pub fn seed<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = f64>,
    {
        for value in values {
            self.push(value);
        }
    }

    fn push(&mut self, latency_ms: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(latency_ms);
    }

    pub fn snapshot(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    /// The last `min(n, len)` values, oldest first
    pub fn last_n(&self, n: usize) -> Vec<f64> {
        let skip = self.values.len().saturating_sub(n);
        self.values.iter().skip(skip).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
