//! Log subscriber setup.
//!
//! Logs go to stderr; stdout carries command output.

use crate::error::{ErrorKind, Result};
use comicback_config::{LogConfig, LogFormat};
use exn::ResultExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

/// Install the global subscriber. `RUST_LOG`, when set and valid, replaces
/// the configured level.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .or_raise(|| ErrorKind::Logging)?;
    let registry = Registry::default().with(filter);
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);
    let installed = match config.format {
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
    installed.or_raise(|| ErrorKind::Logging)
}
