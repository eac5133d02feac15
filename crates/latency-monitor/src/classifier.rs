use crate::stats::RollingStats;
use std::fmt;

/// Severity of a single sample relative to recent history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Normal,
    MildSpike,
    ModerateSpike,
    SevereSpike,
    Timeout,
}

impl Status {
    /// Stable label used in logs and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Normal => "normal",
            Status::MildSpike => "mild_spike",
            Status::ModerateSpike => "moderate_spike",
            Status::SevereSpike => "severe_spike",
            Status::Timeout => "timeout",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Standard deviations by which `latency_ms` exceeds `mean + threshold * stddev`.
///
/// `None` when the score is undefined (zero or non-finite stddev).
pub fn spike_score(latency_ms: f64, stats: &RollingStats, threshold: f64) -> Option<f64> {
    if stats.stddev == 0.0 || !stats.stddev.is_finite() {
        return None;
    }
    let score = (latency_ms - (stats.mean + threshold * stats.stddev)) / stats.stddev;
    score.is_finite().then_some(score)
}

/// Classify one sample. Pure: identical inputs always give the same status.
pub fn classify(latency_ms: Option<f64>, stats: Option<&RollingStats>, threshold: f64) -> Status {
    let Some(latency_ms) = latency_ms else {
        return Status::Timeout;
    };
    let Some(stats) = stats else {
        return Status::Normal;
    };
    let Some(score) = spike_score(latency_ms, stats, threshold) else {
        return Status::Normal;
    };

    if score > 3.0 {
        Status::SevereSpike
    } else if score > 2.0 {
        Status::ModerateSpike
    } else if score > 1.0 {
        Status::MildSpike
    } else {
        Status::Normal
    }
}
