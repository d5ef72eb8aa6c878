// src/collab/control_plane.rs

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::collab::ControlPlane;
use crate::config::model::ControlPlaneSection;
use crate::errors::Result;
use crate::exec::{BoxFuture, CommandRunner, CommandSpec, ProcessBackend};

/// For suites where no app needs a control plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoControlPlane;

impl ControlPlane for NoControlPlane {
    fn install(&mut self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async { Ok(true) })
    }

    fn uninstall(&mut self) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async { Ok(true) })
    }
}

/// Installs and removes the control plane with the configured shell
/// commands. Their output goes to `sink`.
pub struct ShellControlPlane {
    runner: CommandRunner,
    section: ControlPlaneSection,
    sink: PathBuf,
    timeout: Duration,
    dry_run: bool,
}

impl ShellControlPlane {
    pub fn new(
        runner: CommandRunner,
        section: ControlPlaneSection,
        sink: PathBuf,
        timeout: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            runner,
            section,
            sink,
            timeout,
            dry_run,
        }
    }

    async fn run_step(&mut self, label: &str, command: String) -> Result<bool> {
        if let Some(parent) = self.sink.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let spec = CommandSpec {
            label: format!("control-plane-{label}"),
            command,
            sink: self.sink.clone(),
            work_dir: None,
            env: Vec::new(),
            timeout: self.timeout,
            verbose: false,
            dry_run: self.dry_run,
        };
        info!(step = label, "control plane");
        let code = self.runner.run_foreground(&spec).await?;
        if code != 0 {
            warn!(step = label, exit_code = code, sink = ?self.sink, "control plane command failed");
        }
        Ok(code == 0)
    }
}

impl ControlPlane for ShellControlPlane {
    fn install(&mut self) -> BoxFuture<'_, Result<bool>> {
        let command = self.section.install.clone();
        Box::pin(self.run_step("install", command))
    }

    fn uninstall(&mut self) -> BoxFuture<'_, Result<bool>> {
        let command = self.section.uninstall.clone();
        Box::pin(async move {
            match command {
                Some(command) => self.run_step("uninstall", command).await,
                None => Ok(true),
            }
        })
    }
}
