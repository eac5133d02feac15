use chrono::{Local, NaiveDateTime, Timelike};
use std::time::Duration;

/// Timestamp format of the persisted log and console output
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One probe result. `latency == None` means the probe timed out or the host
/// was unreachable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub timestamp: NaiveDateTime,
    pub latency: Option<Duration>,
}

impl Sample {
    pub fn new(timestamp: NaiveDateTime, latency: Option<Duration>) -> Self {
        Self { timestamp, latency }
    }

    /// Sample stamped with the current local wall-clock time, truncated to
    /// whole seconds to match the persisted format
    pub fn now(latency: Option<Duration>) -> Self {
        Self::new(local_now(), latency)
    }

    pub fn latency_ms(&self) -> Option<f64> {
        self.latency.map(|d| d.as_nanos() as f64 / 1_000_000.0)
    }

    pub fn is_timeout(&self) -> bool {
        self.latency.is_none()
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

pub fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
}
