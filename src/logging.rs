//! Explicit logging initialisation.
//!
//! Library code only emits records through the `log` facade. The hosting
//! application decides when (and whether) to install a logger by calling
//! [`init_logging`] once at startup.

use env_logger::{Builder, Env};

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Install an `env_logger` backend honouring `RUST_LOG`, defaulting to `info`.
///
/// Returns `false` if a logger was already installed. Calling it twice is harmless.
pub fn init_logging() -> bool {
    init_logging_with_filter(DEFAULT_FILTER)
}

/// Install an `env_logger` backend with an explicit default filter.
///
/// `RUST_LOG` still takes precedence over `default_filter`.
pub fn init_logging_with_filter(default_filter: &str) -> bool {
    Builder::from_env(Env::default().default_filter_or(default_filter))
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        let _ = init_logging_with_filter("debug");
        // second install must not panic
        assert!(!init_logging());
        log::debug!("logging initialised for tests");
    }
}
