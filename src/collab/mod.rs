// src/collab/mod.rs

//! Collaborators around a validation.
//!
//! None of these are part of the state machine. The suite runner uses them to
//! prepare a request (commands, patches, control plane) and the orchestrator
//! calls the browser-test runner once the app is confirmed ready.

pub mod commands;
pub mod control_plane;
pub mod playwright;

use std::path::PathBuf;

use crate::errors::Result;
use crate::exec::BoxFuture;
use crate::types::Mode;
use crate::watch::Marker;

pub use commands::ConfiguredCommands;
pub use control_plane::{NoControlPlane, ShellControlPlane};
pub use playwright::PlaywrightRunner;

/// What a command provider needs to know about an app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDescriptor {
    pub name: String,
    pub mode: Mode,
    pub version: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildCommands {
    pub compile: String,
    pub run: String,
    pub marker: Marker,
}

pub trait BuildCommandProvider {
    fn commands(&self, app: &AppDescriptor) -> Result<BuildCommands>;
}

/// Prepares an app's working tree for `version` before it is validated.
pub trait PatchApplier {
    /// Returns whether anything was changed.
    fn apply(&mut self, app: &str, version: &str) -> Result<bool>;
}

/// Leaves every working tree alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPatches;

impl PatchApplier for NoPatches {
    fn apply(&mut self, _app: &str, _version: &str) -> Result<bool> {
        Ok(false)
    }
}

/// One browser-test invocation against a ready app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserTestRun {
    pub app: String,
    pub mode: Mode,
    pub version: String,
    pub test_file: PathBuf,
    pub base_url: String,
    /// The validation's sink; test output is appended to it.
    pub sink: PathBuf,
    pub work_dir: Option<PathBuf>,
    pub headed: bool,
    pub verbose: bool,
}

/// Opaque pass/fail test step. Implementations carry their own timeout.
pub trait BrowserTestRunner: Send {
    fn run<'a>(&'a mut self, run: &'a BrowserTestRun) -> BoxFuture<'a, Result<bool>>;
}

/// Auxiliary service some apps depend on.
pub trait ControlPlane {
    fn install(&mut self) -> BoxFuture<'_, Result<bool>>;
    fn uninstall(&mut self) -> BoxFuture<'_, Result<bool>>;
}
