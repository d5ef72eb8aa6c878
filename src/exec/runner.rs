// src/exec/runner.rs

//! The production [`ProcessBackend`]: shell commands via `tokio::process`.

use std::path::Path;
use std::process::Stdio;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::backend::{BoxFuture, CommandSpec, Launch, ProcessBackend, TIMEOUT_EXIT_CODE};
use crate::exec::process::{kill_group_now, ChildProcess, DryRunProcess};
use crate::exec::registry::ProcessRegistry;
use crate::sink::Sink;
use crate::timing::Timing;

/// Runs commands through the platform shell.
///
/// Every child is placed in a fresh process group so the whole subtree can be
/// signalled as a unit, and is recorded in the shared [`ProcessRegistry`]
/// while it runs.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timing: Timing,
    registry: ProcessRegistry,
}

impl CommandRunner {
    pub fn new(timing: Timing, registry: ProcessRegistry) -> Self {
        Self { timing, registry }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    async fn foreground(&self, spec: &CommandSpec) -> Result<i32> {
        let sink = Sink::at(&spec.sink);
        if spec.dry_run {
            sink.append_line(&format!("# {}", spec.command))?;
            info!(label = %spec.label, cmd = %spec.command, "dry-run: recorded command");
            return Ok(0);
        }

        info!(label = %spec.label, cmd = %spec.command, "running command");

        let mut cmd = shell_command(&spec.command, spec.work_dir.as_deref());
        cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning '{}'", spec.command))?;
        let pid = child.id();
        if let Some(pid) = pid {
            self.registry.register(&spec.label, pid);
        }

        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(spawn_pump(stdout, spec.sink.clone(), spec.verbose));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(spawn_pump(stderr, spec.sink.clone(), spec.verbose));
        }

        let (code, timed_out) = match tokio::time::timeout(spec.timeout, child.wait()).await {
            Ok(status) => {
                let status =
                    status.with_context(|| format!("waiting for '{}'", spec.command))?;
                let code = status.code().unwrap_or(-1);
                info!(label = %spec.label, exit_code = code, "command exited");
                (code, false)
            }
            Err(_) => {
                warn!(
                    label = %spec.label,
                    timeout_secs = spec.timeout.as_secs(),
                    "command timed out; killing process group"
                );
                if let Some(pid) = pid {
                    kill_group_now(pid);
                }
                if let Err(e) = child.kill().await {
                    debug!(label = %spec.label, error = %e, "kill after timeout failed");
                }
                (TIMEOUT_EXIT_CODE, true)
            }
        };
        self.registry.forget(&spec.label);

        // Drain whatever is still buffered. A grandchild that inherited the
        // pipes could keep them open, so the drain is bounded.
        for pump in pumps {
            if tokio::time::timeout(self.timing.terminate_grace, pump).await.is_err() {
                debug!(label = %spec.label, "output pump still open after exit");
            }
        }

        if timed_out {
            sink.append_diagnostic(&format!(
                "Command '{}' timed out after {} secs",
                spec.command,
                spec.timeout.as_secs()
            ))?;
        }
        Ok(code)
    }

    async fn background(&self, spec: &CommandSpec) -> Result<Launch> {
        let sink = Sink::at(&spec.sink);
        if spec.dry_run {
            sink.append_line(&format!("# {}", spec.command))?;
            info!(label = %spec.label, cmd = %spec.command, "dry-run: recorded background command");
            return Ok(Launch::Running(Box::new(DryRunProcess::new(spec.label.clone()))));
        }

        info!(label = %spec.label, cmd = %spec.command, "starting background command");

        let out = sink.append_handle()?;
        let err = out.try_clone()?;

        let mut cmd = shell_command(&spec.command, spec.work_dir.as_deref());
        cmd.envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::from(err))
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning '{}'", spec.command))?;
        if let Some(pid) = child.id() {
            self.registry.register(&spec.label, pid);
        }

        tokio::time::sleep(self.timing.launch_grace).await;

        match child.try_wait() {
            Ok(Some(status)) => {
                warn!(
                    label = %spec.label,
                    exit_code = ?status.code(),
                    "process exited during launch grace period"
                );
                self.registry.forget(&spec.label);
                Ok(Launch::DeadOnArrival {
                    exit_code: status.code(),
                })
            }
            Ok(None) => {
                info!(label = %spec.label, pid = ?child.id(), "process is running");
                Ok(Launch::Running(Box::new(ChildProcess::new(
                    spec.label.clone(),
                    child,
                    self.registry.clone(),
                ))))
            }
            Err(e) => {
                self.registry.forget(&spec.label);
                Err(anyhow::Error::from(e)
                    .context(format!("polling '{}' after launch", spec.command))
                    .into())
            }
        }
    }
}

impl ProcessBackend for CommandRunner {
    fn run_foreground<'a>(&'a mut self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<i32>> {
        Box::pin(self.foreground(spec))
    }

    fn run_background<'a>(&'a mut self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<Launch>> {
        Box::pin(self.background(spec))
    }
}

/// Build a shell command appropriate for the platform.
fn shell_command(command: &str, work_dir: Option<&Path>) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };
    if let Some(dir) = work_dir {
        cmd.current_dir(dir);
    }
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// Copy a pipe into the sink verbatim, optionally mirroring it to stdout.
fn spawn_pump<R>(reader: R, sink: std::path::PathBuf, verbose: bool) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut file = match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&sink)
            .await
        {
            Ok(f) => f,
            Err(e) => {
                warn!(sink = ?sink, error = %e, "cannot open sink for output");
                return;
            }
        };
        let mut reader = BufReader::new(reader);
        let mut stdout = tokio::io::stdout();
        let mut line = Vec::new();

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    if let Err(e) = file.write_all(&line).await {
                        warn!(sink = ?sink, error = %e, "writing to sink failed");
                        break;
                    }
                    if verbose {
                        let _ = stdout.write_all(&line).await;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "reading command output failed");
                    break;
                }
            }
        }
        let _ = file.flush().await;
        if verbose {
            let _ = stdout.flush().await;
        }
    })
}
