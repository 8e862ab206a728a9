//! Logging setup
//!
//! Diagnostics go to stderr through `tracing`. `PACKRUN_LOG` (or `RUST_LOG`)
//! takes any `EnvFilter` directive and wins over the verbosity flags.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Verbosity requested on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Verbosity::Verbose,
            (false, true) => Verbosity::Quiet,
            (false, false) => Verbosity::Normal,
        }
    }

    fn default_directive(self) -> &'static str {
        match self {
            Verbosity::Quiet => "packrun=error",
            Verbosity::Normal => "packrun=warn",
            Verbosity::Verbose => "packrun=debug",
        }
    }
}

fn build_filter(verbosity: Verbosity, env_value: Option<String>) -> EnvFilter {
    env_value
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(verbosity.default_directive()))
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(verbosity: Verbosity) {
    INIT.call_once(|| {
        let env_value = std::env::var("PACKRUN_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .ok();

        let _ = tracing_subscriber::fmt()
            .with_env_filter(build_filter(verbosity, env_value))
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_wins_over_quiet() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn test_filter_prefers_environment() {
        let filter = build_filter(Verbosity::Quiet, Some("packrun=trace".to_string()));
        assert_eq!(filter.to_string(), "packrun=trace");
    }

    #[test]
    fn test_filter_falls_back_on_bad_directive() {
        let filter = build_filter(Verbosity::Verbose, Some("packrun=loudest".to_string()));
        assert_eq!(filter.to_string(), "packrun=debug");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init(Verbosity::Quiet);
        init(Verbosity::Verbose);
    }
}
