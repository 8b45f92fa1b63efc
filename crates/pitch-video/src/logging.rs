//! Process-wide tracing subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Builds the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber and forwards `log` records into it.
///
/// Call once at startup. `json` switches the fmt layer to one JSON object
/// per line.
pub fn init_logging(json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = Registry::default().with(env_filter());

    if json {
        let subscriber = registry.with(fmt::layer().json().with_current_span(true));
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = registry.with(fmt::layer().with_target(true));
        tracing::subscriber::set_global_default(subscriber)?;
    }

    tracing_log::LogTracer::init()?;
    Ok(())
}
