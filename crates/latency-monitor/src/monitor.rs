use crate::{
    classifier::{Status, classify},
    probe::Probe,
    recorder::{Recorder, TickRecord},
    sample::{Sample, local_now},
    settings::{PeriodSettings, Settings, StatusSymbols},
    stats::{period_averages, rolling_stats},
    window::RollingWindow,
};
use anyhow::Result;
use std::{fmt::Write as _, io::Write, time::Duration};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Owns the rolling window and drives probe, stats, classification and
/// persistence once per tick
pub struct LatencyMonitor<P, W: Write> {
    host: String,
    probe: P,
    window: RollingWindow,
    recorder: Recorder<W>,
    rolling_window_size: usize,
    threshold_multiplier: f64,
    periods: Vec<PeriodSettings>,
    symbols: StatusSymbols,
    interval: Duration,
}

impl<P: Probe, W: Write> LatencyMonitor<P, W> {
    pub fn new(settings: &Settings, probe: P, recorder: Recorder<W>) -> Self {
        Self {
            host: settings.target.host.clone(),
            probe,
            window: RollingWindow::new(settings.stats.max_entries),
            recorder,
            rolling_window_size: settings.stats.rolling_window_size,
            threshold_multiplier: settings.stats.threshold_multiplier,
            periods: settings.periods.clone(),
            symbols: settings.symbols.clone(),
            interval: settings.interval(),
        }
    }

    /// Seed the window with reloaded history, oldest first
    pub fn seed_history(&mut self, values: Vec<f64>) {
        let loaded = values.len();
        self.window.seed(values);
        info!(
            loaded,
            window_len = self.window.len(),
            capacity = self.window.capacity(),
            "Seeded rolling window from history"
        );
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    /// Run ticks on the configured interval until `shutdown` is cancelled.
    ///
    /// A slow probe delays the next tick rather than overlapping it.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(host = %self.host, interval = ?self.interval, "Monitor started, entering main loop");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    if self.tick_until(&shutdown).await?.is_none() {
                        info!("shutdown signal received during probe, tick abandoned");
                        break;
                    }
                }
            }
        }

        self.recorder.flush()?;
        info!("Monitor stopped");
        Ok(())
    }

    /// Probe once and process the result, or `None` if cancelled before the
    /// probe returned. Nothing is written for an abandoned tick.
    pub async fn tick_until(&mut self, shutdown: &CancellationToken) -> Result<Option<TickRecord>> {
        let timestamp = local_now();
        let latency = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(None),
            latency = self.probe.probe(&self.host) => latency,
        };
        self.process(Sample::new(timestamp, latency)).map(Some)
    }

    pub async fn tick(&mut self) -> Result<TickRecord> {
        let timestamp = local_now();
        let latency = self.probe.probe(&self.host).await;
        self.process(Sample::new(timestamp, latency))
    }

    /// Window update, statistics, classification, persistence and console
    /// output for one sample
    pub fn process(&mut self, sample: Sample) -> Result<TickRecord> {
        self.window.append(&sample);

        let stats = rolling_stats(&self.window, self.rolling_window_size);
        let averages = period_averages(&self.window, &self.periods, self.interval);
        let status = classify(sample.latency_ms(), stats.as_ref(), self.threshold_multiplier);

        let record = TickRecord {
            sample,
            averages,
            status,
        };

        self.recorder.write(&record)?;
        self.emit(&record);

        debug!(
            latency_ms = ?record.sample.latency_ms(),
            mean = ?stats.map(|s| s.mean),
            stddev = ?stats.map(|s| s.stddev),
            status = %record.status,
            window_len = self.window.len(),
            "tick processed"
        );

        Ok(record)
    }

    fn emit(&self, record: &TickRecord) {
        println!("{}", console_line(record, &self.symbols));

        if let Some(latency_ms) = record.sample.latency_ms() {
            metrics::gauge!("doublezero_latency_monitor_latency_ms").set(latency_ms);
        }
        metrics::counter!(
            "doublezero_latency_monitor_status_total",
            "status" => record.status.as_str()
        )
        .increment(1);
        metrics::gauge!("doublezero_latency_monitor_window_len").set(self.window.len() as f64);
    }
}

/// Single console line summarising a tick
pub fn console_line(record: &TickRecord, symbols: &StatusSymbols) -> String {
    let mut line = format!(
        "{} {}: ",
        symbols.symbol(record.status),
        record.sample.formatted_timestamp()
    );

    match record.sample.latency_ms() {
        Some(ms) if record.status != Status::Timeout => {
            let _ = write!(line, "{ms} ms");
        }
        _ => line.push_str("Request timed out"),
    }

    for average in &record.averages {
        if let Some(ms) = average.average_ms {
            let _ = write!(line, " | {} Avg: {ms:.3} ms", average.name);
        }
    }

    line
}
