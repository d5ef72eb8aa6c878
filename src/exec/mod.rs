// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] defines the `ProcessBackend` / `ManagedProcess` seams the
//!   orchestrator drives, so tests can replace real processes with a fake.
//! - [`runner`] holds `CommandRunner`, the production backend built on
//!   `tokio::process::Command`.
//! - [`process`] wraps a spawned child with group-wide terminate/kill.
//! - [`registry`] tracks live process groups for best-effort reaping.
//! - [`tail`] mirrors a growing sink to stdout in verbose mode.
//! - [`command_line`] rewrites command lines (offline flag, placeholders).

pub mod backend;
pub mod command_line;
pub mod process;
pub mod registry;
pub mod runner;
pub mod tail;

pub use backend::{BoxFuture, CommandSpec, Launch, ManagedProcess, ProcessBackend, TIMEOUT_EXIT_CODE};
pub use process::{ChildProcess, DryRunProcess};
pub use registry::ProcessRegistry;
pub use runner::CommandRunner;
pub use tail::TailHandle;
