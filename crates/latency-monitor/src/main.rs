use anyhow::Result;
use clap::Parser;
use doublezero_latency_monitor::{
    history::load_history, monitor::LatencyMonitor, probe::PingProbe, recorder::Recorder,
    sample::local_now,
    settings::{Settings, validation::config_warnings},
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::path::{Path, PathBuf};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "doublezero-latency-monitor",
    about = "Continuously ping a host, track rolling latency statistics and flag spikes",
    version,
    author,
    after_help = r#"Configuration:
    Configuration can be provided via:
    1. Environment variables with DZ__ prefix (e.g., DZ__TARGET__HOST)
    2. .env file in the current directory
    3. Config file with -c option

Examples:
    # Monitor the default target, logging to ping_log.csv
    doublezero-latency-monitor

    # Monitor a specific host with a custom log file
    doublezero-latency-monitor --target 192.168.50.11 --log-file /var/log/latency.csv"#
)]
pub struct Cli {
    /// Path to the configuration file (TOML format)
    ///
    /// If not provided, will attempt to load from environment variables
    #[clap(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Host to probe (overrides config)
    #[clap(short = 't', long, value_name = "HOST")]
    pub target: Option<String>,

    /// Path of the CSV log (overrides config)
    #[clap(short = 'l', long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut settings = if let Some(config_path) = &self.config {
            Settings::from_path(config_path)?
        } else {
            Settings::from_env()?
        };
        if let Some(target) = self.target {
            settings.target.host = target;
        }
        if let Some(log_file) = self.log_file {
            settings.log_file = log_file.to_string_lossy().into_owned();
        }
        init_logging(&settings.log_level)?;

        info!("{settings}");
        for advisory in config_warnings(&settings) {
            warn!("{advisory}");
        }

        if let Some(metrics) = &settings.metrics {
            PrometheusBuilder::new()
                .with_http_listener(metrics.addr)
                .install()?;
            info!(addr = %metrics.addr, "Prometheus exporter listening");
        }

        let log_path = Path::new(&settings.log_file);
        let history = load_history(
            log_path,
            local_now(),
            settings.stats.lookback(),
            settings.stats.max_entries,
        )?;
        let recorder = Recorder::open(log_path, &settings.periods, settings.symbols.clone())?;
        let probe = PingProbe::from_settings(&settings.target);

        let mut monitor = LatencyMonitor::new(&settings, probe, recorder);
        monitor.seed_history(history.values);

        let shutdown = shutdown_listener()?;
        monitor.run(shutdown).await?;

        info!("Ping operation stopped");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run().await
}

fn init_logging(log_level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

fn shutdown_listener() -> Result<CancellationToken> {
    let cancellation_token = CancellationToken::new();
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    tokio::spawn({
        let cancellation_token = cancellation_token.clone();
        async move {
            tokio::select! {
                _ = sigterm.recv() => cancellation_token.cancel(),
                _ = signal::ctrl_c() => cancellation_token.cancel(),
            }
        }
    });

    Ok(cancellation_token)
}
