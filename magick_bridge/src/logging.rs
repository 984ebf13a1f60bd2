use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{BridgeConfig, DEFAULT_LOG_FILTER};

/// Installs a stderr `fmt` subscriber filtered by `config.log_filter`.
///
/// Returns `false` when a global subscriber is already installed.
pub fn init_tracing(config: &BridgeConfig) -> bool {
    let filter = EnvFilter::try_new(&config.log_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
