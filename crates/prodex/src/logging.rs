//! Global tracing setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::broadcast::LogBroadcaster;
use crate::config::LoggingConfig;
use crate::error::LoggingError;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG`, when set, takes precedence over `config.level`. Records
/// emitted through the `log` facade are bridged into tracing. When a
/// broadcaster is given, every event is also forwarded to it.
pub fn init_tracing(
    config: &LoggingConfig,
    broadcaster: Option<&LogBroadcaster>,
) -> Result<(), LoggingError> {
    let filter = build_filter(&config.level, std::env::var(EnvFilter::DEFAULT_ENV).ok())?;

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let subscriber = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .with(broadcaster.map(LogBroadcaster::layer));

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|_| LoggingError::AlreadyInitialized)?;
    tracing_log::LogTracer::init().map_err(LoggingError::LogBridge)?;

    tracing::debug!(level = %config.level, json = config.json, "Tracing initialised");
    Ok(())
}

/// Builds the filter from `RUST_LOG` if non-empty, else from `default_level`.
fn build_filter(default_level: &str, env: Option<String>) -> Result<EnvFilter, LoggingError> {
    let directives = select_directives(default_level, env);

    EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter {
        filter: directives,
        reason: e.to_string(),
    })
}

fn select_directives(default_level: &str, env: Option<String>) -> String {
    env.filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default_level.to_string())
}
