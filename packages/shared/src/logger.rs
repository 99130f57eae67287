//! Logging setup utilities for the chatgate binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// Both the gateway library crates and the binary log at `default_log_level`
/// unless `RUST_LOG` says otherwise.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "chatgate_server")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use chatgate_shared::logger::setup_logger;
///
/// setup_logger("chatgate_server", "info");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    let binary_target = binary_name.replace('-', "_");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "chatgate_server={level},chatgate_client={level},chatgate_shared={level},{binary}={level},tower_http=info",
                    level = default_log_level,
                    binary = binary_target,
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
