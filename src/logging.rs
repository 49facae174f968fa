//! Structured logging
//!
//! Events go to stderr so command output on stdout stays parseable. The
//! filter comes from `RMA_LOG`, then the project's `[logging] level`.

use std::sync::OnceLock;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::storage::LoggingConfig;

/// Environment variable holding an `EnvFilter` directive
pub const LOG_ENV: &str = "RMA_LOG";

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber once; later calls are ignored
pub fn init(config: &LoggingConfig, verbose: bool) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let directive = filter_directive(config, verbose);

        let layer = if config.json {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .json()
                .with_filter(EnvFilter::new(&directive))
                .boxed()
        } else {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .with_filter(EnvFilter::new(&directive))
                .boxed()
        };

        // A host process may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("global tracing subscriber already set");
        }
    });
}

fn filter_directive(config: &LoggingConfig, verbose: bool) -> String {
    resolve_directive(std::env::var(LOG_ENV).ok(), config, verbose)
}

/// `--verbose` beats the environment, which beats the configured level
fn resolve_directive(env: Option<String>, config: &LoggingConfig, verbose: bool) -> String {
    if verbose {
        return "debug".to_string();
    }
    env.filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| config.level.clone())
}
