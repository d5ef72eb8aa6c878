// src/exec/process.rs

//! Owned handles for background processes.

use std::time::Duration;

use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::backend::{BoxFuture, ManagedProcess};
use crate::exec::registry::ProcessRegistry;

/// A real child process running in its own process group.
pub struct ChildProcess {
    label: String,
    pid: Option<u32>,
    child: Child,
    exited: bool,
    terminated: bool,
    registry: ProcessRegistry,
}

impl ChildProcess {
    pub(crate) fn new(label: String, child: Child, registry: ProcessRegistry) -> Self {
        let pid = child.id();
        Self {
            label,
            pid,
            child,
            exited: false,
            terminated: false,
            registry,
        }
    }

    async fn terminate_inner(&mut self, grace: Duration) -> Result<()> {
        if self.terminated {
            debug!(label = %self.label, "terminate: already terminated");
            return Ok(());
        }
        self.terminated = true;
        self.registry.forget(&self.label);

        if !self.is_alive() {
            debug!(label = %self.label, pid = ?self.pid, "terminate: already exited");
            // The group leader is gone, but children it forked may linger.
            if let Some(pid) = self.pid {
                kill_group_now(pid);
            }
            return Ok(());
        }

        info!(label = %self.label, pid = ?self.pid, "stopping process group");
        if let Some(pid) = self.pid {
            signal_group(pid, GroupSignal::Terminate);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                debug!(label = %self.label, ?status, "process stopped after graceful signal");
            }
            Ok(Err(e)) => {
                warn!(label = %self.label, error = %e, "waiting for process failed");
            }
            Err(_) => {
                warn!(
                    label = %self.label,
                    grace_secs = grace.as_secs_f32(),
                    "process ignored graceful signal; killing"
                );
                if let Some(pid) = self.pid {
                    signal_group(pid, GroupSignal::Kill);
                }
                if let Err(e) = self.child.kill().await {
                    debug!(label = %self.label, error = %e, "kill after escalation failed");
                }
            }
        }

        if let Some(pid) = self.pid {
            kill_group_now(pid);
        }
        self.exited = true;
        Ok(())
    }
}

impl ManagedProcess for ChildProcess {
    fn label(&self) -> &str {
        &self.label
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn is_alive(&mut self) -> bool {
        if self.exited {
            return false;
        }
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!(label = %self.label, ?status, "process exited");
                self.exited = true;
                false
            }
            Err(e) => {
                warn!(label = %self.label, error = %e, "could not poll process status");
                self.exited = true;
                false
            }
        }
    }

    fn terminate(&mut self, grace: Duration) -> BoxFuture<'_, Result<()>> {
        Box::pin(self.terminate_inner(grace))
    }
}

/// Stand-in handle returned in dry-run mode. Never backed by an OS process.
#[derive(Debug)]
pub struct DryRunProcess {
    label: String,
    alive: bool,
}

impl DryRunProcess {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            alive: true,
        }
    }
}

impl ManagedProcess for DryRunProcess {
    fn label(&self) -> &str {
        &self.label
    }

    fn pid(&self) -> Option<u32> {
        None
    }

    fn is_alive(&mut self) -> bool {
        self.alive
    }

    fn terminate(&mut self, _grace: Duration) -> BoxFuture<'_, Result<()>> {
        self.alive = false;
        Box::pin(async { Ok(()) })
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(pid: u32, signal: GroupSignal) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let sig = match signal {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    match killpg(Pid::from_raw(pid as i32), sig) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => debug!(pid, ?sig, error = %e, "killpg failed"),
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _signal: GroupSignal) {}

/// SIGKILL a process group, ignoring every error.
pub(crate) fn kill_group_now(pid: u32) {
    signal_group(pid, GroupSignal::Kill);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_process_terminates_once() {
        let mut p = DryRunProcess::new("demo-run");
        assert!(p.is_alive());
        p.terminate(Duration::from_millis(1)).await.unwrap();
        assert!(!p.is_alive());
        p.terminate(Duration::from_millis(1)).await.unwrap();
        assert_eq!(p.pid(), None);
    }
}
