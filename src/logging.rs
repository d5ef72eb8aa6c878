// src/logging.rs

//! Diagnostics for `pit` go to stderr; stdout carries mirrored app output
//! (with `--verbose`) and the suite report.
//!
//! The level for pit's own events is picked from, in order:
//! `--log-level`, `PIT_LOG`, then `debug` when `--verbose` mirrors app
//! output (so the state transitions interleave with it), else `info`.
//! HTTP client internals stay at `warn` whatever the level.

use anyhow::{Context, Result};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

const LEVEL_ENV: &str = "PIT_LOG";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>, verbose: bool) -> Result<()> {
    let env_level = std::env::var(LEVEL_ENV).ok();
    let level = resolve_level(cli_level, env_level.as_deref(), verbose);

    let filter = EnvFilter::try_new(directives(level))
        .with_context(|| format!("building log filter for level {level}"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing log subscriber: {e}"))
}

fn resolve_level(cli: Option<LogLevel>, env: Option<&str>, verbose: bool) -> Level {
    if let Some(lvl) = cli {
        return lvl.into();
    }
    match env.and_then(parse_level) {
        Some(lvl) => lvl,
        None if verbose => Level::DEBUG,
        None => Level::INFO,
    }
}

fn directives(level: Level) -> String {
    let level = level.as_str().to_ascii_lowercase();
    format!("warn,pit_runner={level},pit={level}")
}

// An unknown PIT_LOG value is ignored rather than fatal.
fn parse_level(s: &str) -> Option<Level> {
    match s.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        "debug" => Some(Level::DEBUG),
        "trace" => Some(Level::TRACE),
        _ => None,
    }
}

impl From<LogLevel> for Level {
    fn from(lvl: LogLevel) -> Self {
        match lvl {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_beats_env_and_verbose() {
        let level = resolve_level(Some(LogLevel::Warn), Some("trace"), true);
        assert_eq!(level, Level::WARN);
    }

    #[test]
    fn env_beats_verbose() {
        assert_eq!(resolve_level(None, Some(" Error "), true), Level::ERROR);
    }

    #[test]
    fn verbose_raises_default_to_debug() {
        assert_eq!(resolve_level(None, None, true), Level::DEBUG);
        assert_eq!(resolve_level(None, None, false), Level::INFO);
        assert_eq!(resolve_level(None, Some("loud"), true), Level::DEBUG);
    }

    #[test]
    fn dependencies_stay_at_warn() {
        assert_eq!(directives(Level::TRACE), "warn,pit_runner=trace,pit=trace");
        assert!(EnvFilter::try_new(directives(Level::DEBUG)).is_ok());
    }
}
