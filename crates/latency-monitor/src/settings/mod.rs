pub mod validation;

use crate::classifier::Status;
use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use serde::{Deserialize, Serialize};
use std::{fmt, net::SocketAddr, path::Path, time::Duration};
use validation::validate_config;

/// Main settings configuration for the latency monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Log level for application logging (e.g., "info", "debug", "warn", "error")
    pub log_level: String,
    /// Host being probed
    pub target: TargetSettings,
    /// Path of the persisted CSV time series
    pub log_file: String,
    /// Interval between ticks in milliseconds
    pub interval_ms: u64,
    /// Rolling statistics and window sizing
    pub stats: StatsSettings,
    /// Named averaging periods, reported in this order
    pub periods: Vec<PeriodSettings>,
    /// Display symbols per status
    pub symbols: StatusSymbols,
    /// Prometheus exporter configuration (optional)
    pub metrics: Option<MetricsSettings>,
}

/// Probe target configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetSettings {
    /// Hostname or IP address to ping
    pub host: String,
    /// Seconds to wait for a single echo reply
    pub timeout_secs: u64,
    /// Executable used for probing
    pub ping_command: String,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            host: "google.com".to_string(),
            timeout_secs: 2,
            ping_command: "ping".to_string(),
        }
    }
}

/// Window sizes and anomaly threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSettings {
    /// Number of most recent samples used for rolling mean and std deviation
    pub rolling_window_size: usize,
    /// Number of standard deviations above the mean that bounds normal latency
    pub threshold_multiplier: f64,
    /// Maximum number of latency values kept in memory
    pub max_entries: usize,
    /// How far back persisted records are reloaded on startup, in seconds
    pub lookback_secs: u64,
}

impl Default for StatsSettings {
    fn default() -> Self {
        Self {
            rolling_window_size: 60,
            threshold_multiplier: 2.0,
            max_entries: 600,
            lookback_secs: 12 * 3600,
        }
    }
}

impl StatsSettings {
    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_secs)
    }
}

/// A named averaging period, e.g. `5m` over 300 seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSettings {
    pub name: String,
    pub seconds: u64,
}

impl PeriodSettings {
    pub fn new(name: &str, seconds: u64) -> Self {
        Self {
            name: name.to_string(),
            seconds,
        }
    }

    /// Number of ticks covering this period at the given cadence, rounded up
    pub fn sample_count(&self, interval: Duration) -> usize {
        let interval_ms = interval.as_millis().max(1);
        let period_ms = u128::from(self.seconds) * 1000;
        period_ms.div_ceil(interval_ms) as usize
    }

    /// CSV column header for this period
    pub fn column_name(&self) -> String {
        format!("{} Avg", self.name)
    }
}

pub fn default_periods() -> Vec<PeriodSettings> {
    vec![
        PeriodSettings::new("1m", 60),
        PeriodSettings::new("5m", 5 * 60),
        PeriodSettings::new("10m", 10 * 60),
        PeriodSettings::new("1h", 3600),
        PeriodSettings::new("3h", 3 * 3600),
        PeriodSettings::new("5h", 5 * 3600),
        PeriodSettings::new("12h", 12 * 3600),
    ]
}

/// Text or emoji rendered for each status in the CSV and on the console
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusSymbols {
    pub normal: String,
    pub mild_spike: String,
    pub moderate_spike: String,
    pub severe_spike: String,
    pub timeout: String,
}

impl Default for StatusSymbols {
    fn default() -> Self {
        Self {
            normal: "🟢".to_string(),
            mild_spike: "🟡".to_string(),
            moderate_spike: "🟠".to_string(),
            severe_spike: "🔴".to_string(),
            timeout: "❌".to_string(),
        }
    }
}

impl StatusSymbols {
    pub fn symbol(&self, status: Status) -> &str {
        match status {
            Status::Normal => &self.normal,
            Status::MildSpike => &self.mild_spike,
            Status::ModerateSpike => &self.moderate_spike,
            Status::SevereSpike => &self.severe_spike,
            Status::Timeout => &self.timeout,
        }
    }
}

/// Prometheus exporter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSettings {
    pub addr: SocketAddr,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            target: TargetSettings::default(),
            log_file: "ping_log.csv".to_string(),
            interval_ms: 1000,
            stats: StatsSettings::default(),
            periods: default_periods(),
            symbols: StatusSymbols::default(),
            metrics: None,
        }
    }
}

impl Settings {
    /// Load configuration from a specific config file path
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        // Construct settings, env vars take priority still
        let settings = ConfigBuilder::builder()
            .add_source(File::with_name(&path.as_ref().to_string_lossy()))
            .add_source(
                Environment::with_prefix("DZ")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        validate_config(&settings)?;

        Ok(settings)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        // NOTE: It's ok if this fails (file might not exist)
        let _ = dotenvy::dotenv();

        let settings: Settings = ConfigBuilder::builder()
            .add_source(
                Environment::with_prefix("DZ")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        validate_config(&settings)?;

        Ok(settings)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let periods: Vec<&str> = self.periods.iter().map(|p| p.name.as_str()).collect();
        write!(
            f,
            "Settings {{\n\
             \tLog Level: {}\n\
             \tTarget: {}\n\
             \tProbe Timeout: {}s\n\
             \tLog File: {}\n\
             \tInterval: {}ms\n\
             \tRolling Window Size: {}\n\
             \tThreshold Multiplier: {}\n\
             \tMax Entries: {}\n\
             \tLookback: {}s\n\
             \tPeriods: {}\n\
             }}",
            self.log_level,
            self.target.host,
            self.target.timeout_secs,
            self.log_file,
            self.interval_ms,
            self.stats.rolling_window_size,
            self.stats.threshold_multiplier,
            self.stats.max_entries,
            self.stats.lookback_secs,
            periods.join(", "),
        )
    }
}
