//! Tracing subscriber setup.
//!
//! `FAKT_LOG` takes any `EnvFilter` directive and wins over everything else.
//! Otherwise `--quiet` and `--verbose` win over `[logging] level`.

use fakt_config::LogLevel;
use tracing_subscriber::EnvFilter;

use crate::GlobalArgs;

/// Environment variable holding an explicit filter directive.
pub const LOG_ENV: &str = "FAKT_LOG";

/// Picks the effective level from CLI flags and the configured default.
pub fn effective_level(global: &GlobalArgs, configured: LogLevel) -> LogLevel {
    if global.quiet {
        LogLevel::Quiet
    } else if global.verbose {
        LogLevel::Debug
    } else {
        configured
    }
}

/// Installs the global subscriber, writing to stderr.
///
/// Calling this more than once is harmless; only the first call takes effect.
pub fn init(global: &GlobalArgs, configured: LogLevel) {
    let level = effective_level(global, configured);
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        let l = level.as_filter();
        EnvFilter::new(format!(
            "warn,fakt={l},fakt_cache={l},fakt_hierarchy={l},fakt_router={l}"
        ))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(global.color)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReportFormat;

    fn global(quiet: bool, verbose: bool) -> GlobalArgs {
        GlobalArgs {
            quiet,
            verbose,
            color: false,
            config: None,
            format: ReportFormat::Text,
        }
    }

    #[test]
    fn flags_override_config() {
        assert_eq!(effective_level(&global(true, false), LogLevel::Trace), LogLevel::Quiet);
        assert_eq!(effective_level(&global(false, true), LogLevel::Info), LogLevel::Debug);
        assert_eq!(effective_level(&global(false, false), LogLevel::Trace), LogLevel::Trace);
    }

    #[test]
    fn init_twice_does_not_panic() {
        init(&global(false, false), LogLevel::Info);
        init(&global(false, true), LogLevel::Info);
    }
}
