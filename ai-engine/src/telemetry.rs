//! tracing subscriber setup for the binaries

use crate::config::LoggingConfig;
use fraud_core::{FraudError, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| FraudError::ConfigError(format!("invalid log level '{}': {}", config.level, e)))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.format.as_str() {
        "json" => builder.json().try_init(),
        "pretty" => builder.try_init(),
        other => {
            return Err(FraudError::ConfigError(format!(
                "unknown log format '{}' (expected json or pretty)",
                other
            )))
        }
    };

    installed.map_err(|e| FraudError::ConfigError(format!("tracing already initialised: {}", e)))
}
