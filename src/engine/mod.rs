// src/engine/mod.rs

//! Validation engine.
//!
//! One validation drives a single app through
//! compile → launch → marker → readiness → tests → teardown, restarting the
//! run step when the framework rewrites its generated config.
//!
//! The pure state machine lives in [`core`]; the async/IO shell that talks
//! to processes, sinks and probes is implemented in [`orchestrator`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::detect::ConfigRewriteDetector;
use crate::probe::{default_pending_predicate, PendingPredicate};
use crate::report::{ErrorFamily, StepSummary};
use crate::sink::Sink;
use crate::timing::Timing;
use crate::types::Mode;
use crate::watch::Marker;

pub mod core;
pub mod orchestrator;

pub use core::{MarkerMiss, StepAction, StepEvent, ValidationCore};
pub use orchestrator::ValidationOrchestrator;

/// Marker printed once the dev-mode frontend bundle is ready.
pub const BUNDLE_BUILT_MARKER: &str = "Development frontend bundle built";

/// Behaviour switches of a single validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationFlags {
    /// Pause after readiness so a human can try the app.
    pub interactive: bool,
    pub skip_tests: bool,
    pub skip_browser_tests: bool,
    /// Mirror command output to stdout.
    pub verbose: bool,
    /// Run Maven/Gradle with `--offline`.
    pub offline: bool,
    /// Record commands instead of running them.
    pub dry_run: bool,
    /// Run browser tests with a visible browser.
    pub headed: bool,
}

/// Immutable input of one validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationRequest {
    pub app: String,
    pub mode: Mode,
    pub version: String,
    pub port: u16,
    pub compile: String,
    pub run: String,
    pub marker: Marker,
    pub test_file: Option<PathBuf>,
    /// Bound of the launch marker wait.
    pub timeout: Duration,
    /// Working directory of every command.
    pub work_dir: Option<PathBuf>,
    /// Directory the sink is created in.
    pub out_dir: PathBuf,
    pub flags: ValidationFlags,
}

impl ValidationRequest {
    pub fn sink_path(&self) -> PathBuf {
        self.out_dir
            .join(Sink::file_name(&self.app, self.mode, &self.version))
    }

    pub fn base_url(&self) -> String {
        crate::probe::ReadinessProbe::url_for(self.port)
    }

    /// Whether a browser-test step is part of this validation at all.
    pub fn runs_tests(&self) -> bool {
        self.test_file.is_some() && !self.flags.skip_tests && !self.flags.skip_browser_tests
    }
}

/// Settings shared by every validation of a suite.
#[derive(Clone)]
pub struct OrchestratorConfig {
    /// Total launches allowed when the generated config keeps being
    /// rewritten.
    pub max_launch_attempts: u32,
    pub timing: Timing,
    pub detector: ConfigRewriteDetector,
    /// Best-effort dev-mode wait after readiness.
    pub bundle_marker: Marker,
    /// Headers meaning "frontend still compiling".
    pub is_pending: PendingPredicate,
    pub step_summary: StepSummary,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_launch_attempts: 3,
            timing: Timing::default(),
            detector: ConfigRewriteDetector::default(),
            bundle_marker: Marker::literal(BUNDLE_BUILT_MARKER),
            is_pending: default_pending_predicate(),
            step_summary: StepSummary::disabled(),
        }
    }
}

impl fmt::Debug for OrchestratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestratorConfig")
            .field("max_launch_attempts", &self.max_launch_attempts)
            .field("timing", &self.timing)
            .field("detector", &self.detector)
            .field("bundle_marker", &self.bundle_marker)
            .field("step_summary", &self.step_summary)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationState {
    Idle,
    Compiling,
    Launching,
    AwaitingMarker,
    AwaitingReady,
    Testing,
    RestartingAfterRewrite,
    TornDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchFailure {
    /// Something already listens on the target port; nothing was started.
    PortBusy,
    DeadOnArrival { exit_code: Option<i32> },
    MarkerTimedOut,
    ProcessDied,
}

/// Terminal outcome. Expected failures are values, never errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationResult {
    Passed,
    CompileFailed { exit_code: i32 },
    LaunchFailed(LaunchFailure),
    ReadinessTimeout,
    ConfigRewriteExhausted { attempts: u32 },
    TestsFailed,
    /// Cancelled from outside (Ctrl-C).
    Interrupted,
}

impl ValidationResult {
    pub fn is_passed(&self) -> bool {
        matches!(self, ValidationResult::Passed)
    }

    /// Header used in logs and step-summary reports.
    pub fn headline(&self) -> String {
        match self {
            ValidationResult::Passed => "Passed".to_string(),
            ValidationResult::CompileFailed { exit_code } => {
                format!("Compilation Failed (exit code {exit_code})")
            }
            ValidationResult::LaunchFailed(LaunchFailure::PortBusy) => {
                "Launch Failed: port already in use".to_string()
            }
            ValidationResult::LaunchFailed(LaunchFailure::DeadOnArrival { exit_code }) => {
                match exit_code {
                    Some(code) => format!("Application Start Failed (exit code {code})"),
                    None => "Application Start Failed".to_string(),
                }
            }
            ValidationResult::LaunchFailed(LaunchFailure::MarkerTimedOut) => {
                "Timeout waiting for start message".to_string()
            }
            ValidationResult::LaunchFailed(LaunchFailure::ProcessDied) => {
                "Application died before printing start message".to_string()
            }
            ValidationResult::ReadinessTimeout => "Application not ready on port".to_string(),
            ValidationResult::ConfigRewriteExhausted { attempts } => {
                format!("Generated config still rewritten after {attempts} launches")
            }
            ValidationResult::TestsFailed => "Browser Tests Failed".to_string(),
            ValidationResult::Interrupted => "Interrupted".to_string(),
        }
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.headline())
    }
}

/// What the caller gets back from a validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub result: ValidationResult,
    /// Sink path. Only present on disk when the result is not `Passed`
    /// (or in dry-run).
    pub sink: PathBuf,
    /// Launches performed.
    pub attempts: u32,
    /// States visited, in order, from `Idle` to `TornDown`.
    pub states: Vec<ValidationState>,
    /// Error family the sink points at, for failures.
    pub likely_cause: Option<ErrorFamily>,
}
