// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `pit`.
///
/// `--version` selects the version under test, so clap's automatic version
/// flag is not enabled.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pit",
    about = "Build, launch and browser-test sample applications against a framework version.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the suite file (TOML).
    #[arg(long, value_name = "PATH", default_value = "pit.toml")]
    pub config: String,

    /// Only validate these apps (repeatable). Default: all.
    #[arg(long = "app", value_name = "NAME")]
    pub apps: Vec<String>,

    /// Skip dev-mode validations.
    #[arg(long)]
    pub skip_dev: bool,

    /// Skip prod-mode validations.
    #[arg(long)]
    pub skip_prod: bool,

    /// Version label to validate; overrides `[suite].version`.
    #[arg(long, value_name = "VERSION")]
    pub version: Option<String>,

    /// Port the apps listen on; overrides `[suite].port`.
    #[arg(long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Seconds to wait for the start marker; overrides the suite file.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Run Maven/Gradle offline.
    #[arg(long, env = "PIT_OFFLINE")]
    pub offline: bool,

    /// Mirror command output to stdout.
    #[arg(long, env = "PIT_VERBOSE")]
    pub verbose: bool,

    /// Pause after each app is ready so it can be tried by hand.
    #[arg(long)]
    pub interactive: bool,

    /// Do not run any tests.
    #[arg(long)]
    pub skip_tests: bool,

    /// Do not run browser tests.
    #[arg(long)]
    pub skip_browser_tests: bool,

    /// Show the browser while testing.
    #[arg(long)]
    pub headed: bool,

    /// Record the commands that would run without executing them.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// Overrides `PIT_LOG`. Without either, the level is `debug` under
    /// `--verbose` and `info` otherwise.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Markdown file that failure reports are appended to.
    #[arg(long, value_name = "PATH", env = "GITHUB_STEP_SUMMARY")]
    pub step_summary: Option<PathBuf>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeatable_apps_and_overrides() {
        let args = CliArgs::try_parse_from([
            "pit",
            "--app",
            "hello",
            "--app",
            "world",
            "--version",
            "24.8.0",
            "--skip-dev",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(args.apps, vec!["hello", "world"]);
        assert_eq!(args.version.as_deref(), Some("24.8.0"));
        assert!(args.skip_dev && !args.skip_prod && args.dry_run);
        assert_eq!(args.config, "pit.toml");
    }
}
