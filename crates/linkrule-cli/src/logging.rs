use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Installs the global subscriber and routes `log` records into it.
/// Output goes to stderr so stdout stays machine-readable.
pub fn init(verbose: bool, json: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_log::LogTracer::init().context("Failed to bridge log records")?;

    let installed = if json {
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr));
        tracing::subscriber::set_global_default(subscriber)
    };
    installed.context("Failed to install tracing subscriber")
}
