use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use super::config::Config;

pub const ENV_LOG: &str = "TFLOW_LOG";

/// Installs the global subscriber, writing to the configured log file since
/// the terminal belongs to the UI.
///
/// The filter comes from `TFLOW_LOG`, then `RUST_LOG`, then `info`.
pub fn init_logging(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = config.log_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)?;

    let filter = EnvFilter::try_from_env(ENV_LOG)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false),
        )
        .try_init()?;
    Ok(())
}
