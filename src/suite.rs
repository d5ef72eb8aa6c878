// src/suite.rs

//! Sequential suite runner: every configured app × mode, one at a time.
//!
//! Apps share a single port and working-directory convention, so nothing
//! here runs concurrently.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::collab::{AppDescriptor, BrowserTestRunner, BuildCommandProvider, ControlPlane, PatchApplier};
use crate::config::model::{AppConfig, SuiteConfig};
use crate::engine::{ValidationFlags, ValidationOrchestrator, ValidationRequest, ValidationResult};
use crate::errors::Result;
use crate::exec::ProcessBackend;
use crate::probe::ReadinessCheck;
use crate::types::Mode;

/// Caller-side selection and overrides for one suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuitePlan {
    /// Only these apps; empty means all.
    pub apps: Vec<String>,
    pub modes: Vec<Mode>,
    pub version: Option<String>,
    pub port: Option<u16>,
    /// Marker timeout override in seconds.
    pub timeout: Option<u64>,
    pub flags: ValidationFlags,
    /// Directory relative paths in the suite file resolve against.
    pub base_dir: PathBuf,
}

impl Default for SuitePlan {
    fn default() -> Self {
        Self {
            apps: Vec::new(),
            modes: vec![Mode::Dev, Mode::Prod],
            version: None,
            port: None,
            timeout: None,
            flags: ValidationFlags::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl SuitePlan {
    fn selects(&self, app: &str) -> bool {
        self.apps.is_empty() || self.apps.iter().any(|a| a == app)
    }

    pub fn version<'a>(&'a self, cfg: &'a SuiteConfig) -> &'a str {
        self.version.as_deref().unwrap_or(&cfg.suite.version)
    }

    pub fn port(&self, cfg: &SuiteConfig) -> u16 {
        self.port.unwrap_or(cfg.suite.port)
    }

    pub fn out_dir(&self, cfg: &SuiteConfig) -> PathBuf {
        match &cfg.suite.out_dir {
            Some(dir) => resolve(&self.base_dir, dir),
            None => self.base_dir.clone(),
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Passed,
    Failed(ValidationResult),
    Skipped(String),
    /// The orchestrator or a collaborator faulted.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteEntry {
    pub app: String,
    pub mode: Mode,
    pub status: EntryStatus,
    pub sink: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteReport {
    pub entries: Vec<SuiteEntry>,
    pub interrupted: bool,
}

impl SuiteReport {
    fn count(&self, pred: impl Fn(&EntryStatus) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.status)).count()
    }

    pub fn passed(&self) -> usize {
        self.count(|s| matches!(s, EntryStatus::Passed))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, EntryStatus::Failed(_) | EntryStatus::Error(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, EntryStatus::Skipped(_)))
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0 && !self.interrupted
    }

    fn push(&mut self, app: &str, mode: Mode, status: EntryStatus, sink: Option<PathBuf>) {
        self.entries.push(SuiteEntry {
            app: app.to_string(),
            mode,
            status,
            sink,
        });
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            let status = match &entry.status {
                EntryStatus::Passed => "passed".to_string(),
                EntryStatus::Failed(result) => format!("FAILED: {result}"),
                EntryStatus::Skipped(why) => format!("skipped: {why}"),
                EntryStatus::Error(e) => format!("ERROR: {e}"),
            };
            write!(f, "  {:<40} {:<5} {status}", entry.app, entry.mode.as_str())?;
            if let Some(sink) = entry.sink.as_ref().filter(|_| entry.status != EntryStatus::Passed) {
                write!(f, " ({})", sink.display())?;
            }
            writeln!(f)?;
        }
        write!(
            f,
            "{} passed, {} failed, {} skipped{}",
            self.passed(),
            self.failed(),
            self.skipped(),
            if self.interrupted { " (interrupted)" } else { "" }
        )
    }
}

/// Build the request for one app × mode.
pub fn build_request(
    cfg: &SuiteConfig,
    plan: &SuitePlan,
    name: &str,
    app: &AppConfig,
    mode: Mode,
    commands: &dyn BuildCommandProvider,
) -> Result<ValidationRequest> {
    let version = plan.version(cfg).to_string();
    let port = plan.port(cfg);
    let resolved = commands.commands(&AppDescriptor {
        name: name.to_string(),
        mode,
        version: version.clone(),
        port,
    })?;

    let test_file = app
        .mode(mode)
        .and_then(|m| m.test_file.clone())
        .or_else(|| app.test_file.clone())
        .map(|p| resolve(&plan.base_dir, &p));
    let timeout = plan
        .timeout
        .or(app.timeout)
        .unwrap_or(cfg.suite.timeout);

    Ok(ValidationRequest {
        app: name.to_string(),
        mode,
        version,
        port,
        compile: resolved.compile,
        run: resolved.run,
        marker: resolved.marker,
        test_file,
        timeout: Duration::from_secs(timeout),
        work_dir: app.dir.as_ref().map(|d| resolve(&plan.base_dir, d)),
        out_dir: plan.out_dir(cfg),
        flags: plan.flags,
    })
}

pub struct SuiteRunner<B, P, T>
where
    B: ProcessBackend,
    P: ReadinessCheck,
    T: BrowserTestRunner,
{
    orchestrator: ValidationOrchestrator<B, P, T>,
    commands: Box<dyn BuildCommandProvider>,
    patches: Box<dyn PatchApplier>,
    control_plane: Box<dyn ControlPlane>,
    cancel: CancellationToken,
}

impl<B, P, T> SuiteRunner<B, P, T>
where
    B: ProcessBackend,
    P: ReadinessCheck,
    T: BrowserTestRunner,
{
    pub fn new(
        orchestrator: ValidationOrchestrator<B, P, T>,
        commands: Box<dyn BuildCommandProvider>,
        patches: Box<dyn PatchApplier>,
        control_plane: Box<dyn ControlPlane>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            commands,
            patches,
            control_plane,
            cancel,
        }
    }

    pub fn orchestrator(&self) -> &ValidationOrchestrator<B, P, T> {
        &self.orchestrator
    }

    pub async fn run(&mut self, cfg: &SuiteConfig, plan: &SuitePlan) -> Result<SuiteReport> {
        let mut report = SuiteReport::default();
        let version = plan.version(cfg).to_string();

        for (name, app) in cfg.app.iter().filter(|(name, _)| plan.selects(name)) {
            let modes: Vec<Mode> = app.modes().filter(|m| plan.modes.contains(m)).collect();
            if modes.is_empty() {
                continue;
            }
            if self.cancel.is_cancelled() {
                report.interrupted = true;
                break;
            }

            if cfg.is_unsupported(name) {
                warn!(app = %name, "app is not supported in this environment; skipping");
                for mode in modes {
                    report.push(name, mode, EntryStatus::Skipped("unsupported".into()), None);
                }
                continue;
            }

            if let Err(e) = self.patches.apply(name, &version) {
                error!(app = %name, error = %e, "patching failed");
                for mode in modes {
                    report.push(name, mode, EntryStatus::Error(format!("patching failed: {e}")), None);
                }
                continue;
            }

            if app.control_plane && !plan.flags.dry_run {
                match self.control_plane.install().await {
                    Ok(true) => {}
                    Ok(false) | Err(_) => {
                        error!(app = %name, "control plane install failed");
                        for mode in modes {
                            report.push(
                                name,
                                mode,
                                EntryStatus::Error("control plane install failed".into()),
                                None,
                            );
                        }
                        continue;
                    }
                }
            }

            for mode in modes {
                if self.cancel.is_cancelled() {
                    report.interrupted = true;
                    break;
                }
                self.run_one(cfg, plan, name, app, mode, &mut report).await;
                if report.interrupted {
                    break;
                }
            }

            if app.control_plane && !plan.flags.dry_run {
                match self.control_plane.uninstall().await {
                    Ok(true) => {}
                    Ok(false) => warn!(app = %name, "control plane uninstall failed"),
                    Err(e) => warn!(app = %name, error = %e, "control plane uninstall failed"),
                }
            }

            if report.interrupted {
                break;
            }
        }

        info!(
            passed = report.passed(),
            failed = report.failed(),
            skipped = report.skipped(),
            "suite finished"
        );
        Ok(report)
    }

    async fn run_one(
        &mut self,
        cfg: &SuiteConfig,
        plan: &SuitePlan,
        name: &str,
        app: &AppConfig,
        mode: Mode,
        report: &mut SuiteReport,
    ) {
        let req = match build_request(cfg, plan, name, app, mode, self.commands.as_ref()) {
            Ok(req) => req,
            Err(e) => {
                error!(app = %name, %mode, error = %e, "cannot build validation request");
                report.push(name, mode, EntryStatus::Error(e.to_string()), None);
                return;
            }
        };

        match self.orchestrator.validate(&req).await {
            Ok(outcome) => {
                let status = match outcome.result {
                    ValidationResult::Passed => EntryStatus::Passed,
                    ValidationResult::Interrupted => {
                        report.interrupted = true;
                        EntryStatus::Failed(ValidationResult::Interrupted)
                    }
                    other => EntryStatus::Failed(other),
                };
                report.push(name, mode, status, Some(outcome.sink));
            }
            Err(e) => {
                error!(app = %name, %mode, error = %e, "validation aborted");
                report.push(name, mode, EntryStatus::Error(e.to_string()), Some(req.sink_path()));
            }
        }
    }
}
