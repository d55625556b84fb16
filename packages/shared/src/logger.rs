//! Logging setup utilities for the Kadai binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// The default filter enables `binary_name` and every crate in `crate_names`
/// at `default_log_level`. The filter can be overridden using the `RUST_LOG`
/// environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "kadai-server")
/// * `default_log_level` - The default log level (e.g., "debug", "info")
/// * `crate_names` - Library crates whose logs should be enabled as well
///
/// # Examples
///
/// ```no_run
/// use kadai_shared::logger::setup_logger;
///
/// setup_logger("kadai-server", "debug", &["kadai_server", "kadai_shared"]);
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str, crate_names: &[&str]) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                default_filter(binary_name, default_log_level, crate_names).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the `EnvFilter` directive used when `RUST_LOG` is not set.
fn default_filter(binary_name: &str, default_log_level: &str, crate_names: &[&str]) -> String {
    std::iter::once(binary_name)
        .chain(crate_names.iter().copied())
        .map(|name| format!("{}={}", name.replace('-', "_"), default_log_level))
        .collect::<Vec<_>>()
        .join(",")
}
