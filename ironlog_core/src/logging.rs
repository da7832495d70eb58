//! Tracing setup for ironlog.
//!
//! `IRONLOG_LOG` wins over `RUST_LOG`. Without either, ironlog's own targets
//! log at the requested level and dependencies (rusqlite and friends) stay at
//! `warn`. Output goes to stderr so command output on stdout stays clean.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding an `EnvFilter` directive string
pub const LOG_ENV: &str = "IRONLOG_LOG";

/// Targets the level passed to [`init_with_level`] applies to
const IRONLOG_TARGETS: [&str; 2] = ["ironlog_core", "ironlog"];

/// Filter directives used when no environment override is set
pub fn default_directives(level: &str) -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(IRONLOG_TARGETS.iter().map(|target| format!("{}={}", target, level)));
    directives.join(",")
}

fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// CLI default: only warnings and errors
pub fn init() {
    init_with_level("warn")
}

/// Install the subscriber with ironlog's targets at `level`.
///
/// Calling it twice is harmless; the second call is ignored.
pub fn init_with_level(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter_for(level))
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init();
}

#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new(default_directives("debug")))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_level_to_ironlog() {
        assert_eq!(
            default_directives("debug"),
            "warn,ironlog_core=debug,ironlog=debug"
        );
        assert!(EnvFilter::try_new(default_directives("info")).is_ok());
    }
}
