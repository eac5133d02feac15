use crate::{error::ProbeError, settings::TargetSettings};
use async_trait::async_trait;
use mockall::automock;
use std::{process::Stdio, time::Duration};
use tokio::{process::Command, time::timeout};
use tracing::debug;

/// Source of latency samples. `None` is reported for any failed probe.
#[automock]
#[async_trait]
pub trait Probe {
    async fn probe(&self, host: &str) -> Option<Duration>;
}

/// Probe backed by a single echo request of the system `ping` command
#[derive(Debug, Clone)]
pub struct PingProbe {
    command: String,
    timeout: Duration,
}

impl PingProbe {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &TargetSettings) -> Self {
        Self::new(
            settings.ping_command.clone(),
            Duration::from_secs(settings.timeout_secs),
        )
    }

    pub async fn ping(&self, host: &str) -> Result<Duration, ProbeError> {
        // Reply-wait flags differ between ping builds (`-W` is seconds on Linux,
        // milliseconds on macOS), so the deadline is enforced here instead.
        let child = Command::new(&self.command)
            .args(["-c", "1", host])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Dropping the future on timeout kills the child
        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(ProbeError::Unreachable(output.status.code()));
        }

        parse_rtt(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl Probe for PingProbe {
    async fn probe(&self, host: &str) -> Option<Duration> {
        match self.ping(host).await {
            Ok(rtt) => Some(rtt),
            Err(err) => {
                debug!(%host, %err, "probe failed");
                None
            }
        }
    }
}

/// Extract the round-trip time from the `time=<ms>` field of ping output
pub fn parse_rtt(output: &str) -> Result<Duration, ProbeError> {
    let raw = output
        .lines()
        .find_map(|line| line.split_once("time=").map(|(_, rest)| rest))
        .and_then(|rest| rest.split_whitespace().next())
        .ok_or(ProbeError::MissingRtt)?;

    // Some ping builds glue the unit onto the value ("time=12.3ms")
    let value = raw.trim_end_matches("ms");
    let ms: f64 = value
        .parse()
        .map_err(|_| ProbeError::InvalidRtt(raw.to_string()))?;
    if !ms.is_finite() || ms < 0.0 {
        return Err(ProbeError::InvalidRtt(raw.to_string()));
    }

    Ok(Duration::from_nanos((ms * 1_000_000.0).round() as u64))
}
