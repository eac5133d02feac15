use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to spawn probe command: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("probe did not finish within {0:?}")]
    Timeout(Duration),
    #[error("host unreachable (exit code {0:?})")]
    Unreachable(Option<i32>),
    #[error("no round-trip time found in probe output")]
    MissingRtt,
    #[error("invalid round-trip time '{0}'")]
    InvalidRtt(String),
}
