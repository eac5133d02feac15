pub mod classifier;
pub mod error;
pub mod history;
pub mod monitor;
pub mod probe;
pub mod recorder;
pub mod sample;
pub mod settings;
pub mod stats;
pub mod window;

pub use classifier::{Status, classify};
pub use monitor::LatencyMonitor;
pub use stats::{RollingStats, period_average, rolling_stats};
pub use window::RollingWindow;
