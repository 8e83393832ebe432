//! Logging setup.
//!
//! Logs go to **stderr** through a `tracing` subscriber filtered by
//! `RUST_LOG`. HTTP round trips log at `debug`, lifecycle operations at
//! `info` and retried API calls at `warn`. Tokens and secret values never
//! reach the log; secrets appear censored.
//!
//! # Examples
//!
//! ```bash
//! # Lifecycle operations only (default)
//! RUST_LOG=info ./circleci-provider
//!
//! # Every request sent to CircleCI
//! RUST_LOG=circleci_provider=debug ./circleci-provider
//! ```

use tracing_subscriber::{fmt, prelude::*, registry::Registry, EnvFilter, Layer};

/// Level used when `RUST_LOG` is unset or unparseable.
pub const DEFAULT_LOG_LEVEL: &str = "info";

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer() -> impl Layer<Registry> + Send + Sync {
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Install the stderr subscriber, defaulting to `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default(DEFAULT_LOG_LEVEL);
}

/// Like [`init_logging`] with another level for when `RUST_LOG` is unset.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(stderr_layer().with_filter(filter(default_level)))
        .init();
}

/// Try to install the subscriber; `false` if one is already set.
///
/// Safe to call from several tests in the same process.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(stderr_layer().with_filter(filter(DEFAULT_LOG_LEVEL)))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so only the
    // non-panicking entry point is exercised here.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new(DEFAULT_LOG_LEVEL).is_ok());
        assert!(EnvFilter::try_new("circleci_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,circleci_provider::client=debug").is_ok());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
