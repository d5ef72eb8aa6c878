// src/exec/backend.rs

//! Pluggable process backend abstraction.
//!
//! The orchestrator talks to a `ProcessBackend` instead of spawning
//! processes itself. Production code uses [`CommandRunner`]; tests can swap
//! in a scripted fake that writes canned output into the sink.
//!
//! [`CommandRunner`]: crate::exec::CommandRunner

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use crate::errors::Result;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Exit code returned by `run_foreground` when the command hit its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Everything needed to start one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Short name used for logging and the process registry.
    pub label: String,
    /// Shell command line.
    pub command: String,
    /// Sink that receives combined stdout/stderr.
    pub sink: PathBuf,
    pub work_dir: Option<PathBuf>,
    /// Extra environment for the child. The parent environment is inherited.
    pub env: Vec<(String, String)>,
    /// Upper bound for foreground commands; ignored for background ones.
    pub timeout: Duration,
    /// Mirror foreground output to stdout.
    pub verbose: bool,
    /// Record the command in the sink instead of running it.
    pub dry_run: bool,
}

/// Result of starting a background command.
pub enum Launch {
    Running(Box<dyn ManagedProcess>),
    /// The process exited within the launch grace period.
    DeadOnArrival { exit_code: Option<i32> },
}

impl std::fmt::Debug for Launch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Launch::Running(p) => f
                .debug_struct("Running")
                .field("label", &p.label())
                .field("pid", &p.pid())
                .finish(),
            Launch::DeadOnArrival { exit_code } => f
                .debug_struct("DeadOnArrival")
                .field("exit_code", exit_code)
                .finish(),
        }
    }
}

/// An owned, long-lived process. Whoever holds the box is responsible for
/// calling [`ManagedProcess::terminate`].
pub trait ManagedProcess: Send {
    fn label(&self) -> &str;

    /// OS pid, if one was ever created.
    fn pid(&self) -> Option<u32>;

    fn is_alive(&mut self) -> bool;

    /// Graceful stop, then forceful kill after `grace`.
    ///
    /// A process that already exited, or was already terminated, is not an
    /// error; repeated calls are no-ops.
    fn terminate(&mut self, grace: Duration) -> BoxFuture<'_, Result<()>>;
}

/// Trait abstracting how commands are executed.
pub trait ProcessBackend: Send {
    /// Run to completion and return the exit code.
    fn run_foreground<'a>(&'a mut self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<i32>>;

    /// Start in the background and return once the launch grace period has
    /// been survived (or not).
    fn run_background<'a>(&'a mut self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<Launch>>;
}
