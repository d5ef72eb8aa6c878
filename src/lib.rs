// src/lib.rs

pub mod cli;
pub mod collab;
pub mod config;
pub mod detect;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod probe;
pub mod report;
pub mod sink;
pub mod suite;
pub mod timing;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::collab::{
    ConfiguredCommands, ControlPlane, NoControlPlane, NoPatches, PlaywrightRunner,
    ShellControlPlane,
};
use crate::config::loader::load_and_validate;
use crate::config::model::SuiteConfig;
use crate::engine::{OrchestratorConfig, ValidationFlags, ValidationOrchestrator};
use crate::exec::{CommandRunner, ProcessRegistry};
use crate::probe::ReadinessProbe;
use crate::report::StepSummary;
use crate::suite::{SuitePlan, SuiteReport, SuiteRunner};
use crate::timing::Timing;
use crate::types::Mode;

const CONTROL_PLANE_TIMEOUT: Duration = Duration::from_secs(600);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - suite file loading
/// - the process runner, readiness probe and browser-test runner
/// - the orchestrator and suite runner
/// - Ctrl-C handling and best-effort reaping of leftover processes
pub async fn run(args: CliArgs) -> Result<SuiteReport> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let plan = plan_from_args(&args, config_root_dir(&config_path));

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("interrupt received; tearing down");
            cancel.cancel();
        });
    }

    let registry = ProcessRegistry::new();
    let timing = Timing::default();
    let config = OrchestratorConfig {
        max_launch_attempts: cfg.suite.max_launch_attempts,
        timing,
        step_summary: StepSummary::new(args.step_summary.clone()),
        ..OrchestratorConfig::default()
    };

    let runner = CommandRunner::new(timing, registry.clone());
    let probe = ReadinessProbe::new(timing, config.is_pending.clone())?;
    let tests = PlaywrightRunner::new(runner.clone());
    let orchestrator =
        ValidationOrchestrator::new(runner.clone(), probe, tests, config, cancel.clone());

    let mut suite = SuiteRunner::new(
        orchestrator,
        Box::new(ConfiguredCommands::from_config(&cfg)),
        Box::new(NoPatches),
        control_plane(&cfg, &plan, runner),
        cancel,
    );

    let result = suite.run(&cfg, &plan).await;

    let reaped = registry.reap_all();
    if reaped > 0 {
        warn!(reaped, "killed leftover process groups");
    }

    let report = result?;
    println!("{report}");
    Ok(report)
}

/// Fold CLI flags into the suite plan.
pub fn plan_from_args(args: &CliArgs, base_dir: PathBuf) -> SuitePlan {
    let modes = [Mode::Dev, Mode::Prod]
        .into_iter()
        .filter(|m| match m {
            Mode::Dev => !args.skip_dev,
            Mode::Prod => !args.skip_prod,
        })
        .collect();

    SuitePlan {
        apps: args.apps.clone(),
        modes,
        version: args.version.clone(),
        port: args.port,
        timeout: args.timeout,
        flags: ValidationFlags {
            interactive: args.interactive,
            skip_tests: args.skip_tests,
            skip_browser_tests: args.skip_browser_tests,
            verbose: args.verbose,
            offline: args.offline,
            dry_run: args.dry_run,
            headed: args.headed,
        },
        base_dir,
    }
}

fn control_plane(cfg: &SuiteConfig, plan: &SuitePlan, runner: CommandRunner) -> Box<dyn ControlPlane> {
    match &cfg.control_plane {
        Some(section) => Box::new(ShellControlPlane::new(
            runner,
            section.clone(),
            plan.out_dir(cfg).join("control-plane.out"),
            CONTROL_PLANE_TIMEOUT,
            plan.flags.dry_run,
        )),
        None => Box::new(NoControlPlane),
    }
}

/// Directory relative paths in the suite file resolve against.
///
/// - If the config path has a non-empty parent (e.g. "suites/pit.toml"),
///   we use that directory.
/// - If it's just a bare filename like "pit.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
