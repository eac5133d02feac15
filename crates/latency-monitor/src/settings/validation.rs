use crate::settings::Settings;
use anyhow::{Result, bail};
use std::{
    collections::HashSet,
    net::{IpAddr, SocketAddr},
};

/// Validate the configuration values
pub fn validate_config(settings: &Settings) -> Result<()> {
    // Validate log level
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&settings.log_level.to_lowercase().as_str()) {
        bail!(
            "Invalid log level '{}'. Valid options are: {:?}",
            settings.log_level,
            valid_log_levels
        );
    }

    // Validate target settings
    if settings.target.host.trim().is_empty() {
        bail!("Target host cannot be empty");
    }
    if settings.target.timeout_secs == 0 {
        bail!("Target timeout_secs must be greater than 0");
    }
    if settings.target.ping_command.trim().is_empty() {
        bail!("Target ping_command cannot be empty");
    }

    if settings.log_file.trim().is_empty() {
        bail!("Log file path cannot be empty");
    }

    if settings.interval_ms == 0 {
        bail!("Tick interval_ms must be greater than 0");
    }

    // Validate stats settings
    if settings.stats.rolling_window_size < 2 {
        bail!(
            "Stats rolling_window_size must be at least 2, got {}",
            settings.stats.rolling_window_size
        );
    }

    if !settings.stats.threshold_multiplier.is_finite() || settings.stats.threshold_multiplier <= 0.0
    {
        bail!(
            "Stats threshold_multiplier must be a positive number, got {}",
            settings.stats.threshold_multiplier
        );
    }

    if settings.stats.max_entries == 0 {
        bail!("Stats max_entries must be greater than 0");
    }

    if settings.stats.lookback_secs == 0 {
        bail!("Stats lookback_secs must be greater than 0");
    }

    // Validate periods
    let mut names = HashSet::new();
    for period in &settings.periods {
        if period.name.trim().is_empty() {
            bail!("Period name cannot be empty");
        }
        if period.seconds == 0 {
            bail!("Period '{}' must cover at least one second", period.name);
        }
        if !names.insert(period.name.as_str()) {
            bail!("Duplicate period name '{}'", period.name);
        }
    }

    // Validate status symbols
    let symbols = &settings.symbols;
    for (name, symbol) in [
        ("normal", &symbols.normal),
        ("mild_spike", &symbols.mild_spike),
        ("moderate_spike", &symbols.moderate_spike),
        ("severe_spike", &symbols.severe_spike),
        ("timeout", &symbols.timeout),
    ] {
        if symbol.is_empty() {
            bail!("Status symbol '{name}' cannot be empty");
        }
    }

    if let Some(metrics) = &settings.metrics {
        if !validate_socket_addr(&metrics.addr) {
            bail!("Invalid SocketAddr: {}", metrics.addr)
        }
    }

    Ok(())
}

/// Valid but questionable settings, reported once logging is up
pub fn config_warnings(settings: &Settings) -> Vec<String> {
    let mut warnings = Vec::new();
    let max_entries = settings.stats.max_entries;

    if settings.stats.rolling_window_size > max_entries {
        warnings.push(format!(
            "rolling_window_size {} exceeds max_entries {max_entries}; rolling stats cover at most {max_entries} samples",
            settings.stats.rolling_window_size
        ));
    }

    for period in &settings.periods {
        let samples = period.sample_count(settings.interval());
        if samples > max_entries {
            warnings.push(format!(
                "period '{}' spans {samples} samples but max_entries is {max_entries}; its average covers the whole window",
                period.name
            ));
        }
    }

    warnings
}

fn validate_socket_addr(addr: &SocketAddr) -> bool {
    match addr.ip() {
        IpAddr::V4(ipv4) => !ipv4.is_broadcast() && !ipv4.is_multicast(),
        IpAddr::V6(ipv6) => !ipv6.is_unspecified() && !ipv6.is_multicast(),
    }
}
