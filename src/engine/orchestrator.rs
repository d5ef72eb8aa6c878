// src/engine/orchestrator.rs

use std::fmt;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::collab::{BrowserTestRun, BrowserTestRunner};
use crate::engine::core::{MarkerMiss, StepAction, StepEvent, ValidationCore};
use crate::engine::{
    OrchestratorConfig, ValidationOutcome, ValidationRequest, ValidationResult,
};
use crate::errors::Result;
use crate::exec::command_line::with_offline_flag;
use crate::exec::{CommandSpec, Launch, ManagedProcess, ProcessBackend, TailHandle};
use crate::probe::{ProbeOutcome, ReadinessCheck};
use crate::report::{likely_cause, scan_deprecations, scan_errors, ErrorFamily};
use crate::sink::Sink;
use crate::types::Mode;
use crate::watch::{await_pattern, Marker, WaitOutcome};

/// Drives [`ValidationCore`] against real (or fake) processes, probes and
/// test runners.
///
/// This is the IO shell: every decision is taken by the core, this struct
/// only performs the requested actions and reports what it observed.
pub struct ValidationOrchestrator<B, P, T>
where
    B: ProcessBackend,
    P: ReadinessCheck,
    T: BrowserTestRunner,
{
    backend: B,
    probe: P,
    tests: T,
    config: OrchestratorConfig,
    cancel: CancellationToken,
}

impl<B, P, T> fmt::Debug for ValidationOrchestrator<B, P, T>
where
    B: ProcessBackend,
    P: ReadinessCheck,
    T: BrowserTestRunner,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Live resources of one validation; released by teardown.
#[derive(Default)]
struct LiveRun {
    process: Option<Box<dyn ManagedProcess>>,
    tail: Option<TailHandle>,
}

impl<B, P, T> ValidationOrchestrator<B, P, T>
where
    B: ProcessBackend,
    P: ReadinessCheck,
    T: BrowserTestRunner,
{
    pub fn new(
        backend: B,
        probe: P,
        tests: T,
        config: OrchestratorConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            probe,
            tests,
            config,
            cancel,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn tests(&self) -> &T {
        &self.tests
    }

    /// Run one validation to its terminal result.
    ///
    /// Expected failures come back as [`ValidationResult`] values. An `Err`
    /// means the orchestrator itself could not proceed (for instance the
    /// sink could not be written); the run-process is torn down before it
    /// is returned.
    pub async fn validate(&mut self, req: &ValidationRequest) -> Result<ValidationOutcome> {
        let span = info_span!("validate", app = %req.app, mode = %req.mode, version = %req.version);
        self.validate_inner(req).instrument(span).await
    }

    async fn validate_inner(&mut self, req: &ValidationRequest) -> Result<ValidationOutcome> {
        let sink = Sink::create_clean(req.sink_path(), self.config.max_launch_attempts)?;
        let mut core = ValidationCore::new(req.mode, req.runs_tests(), self.config.max_launch_attempts);
        let mut live = LiveRun::default();

        info!(sink = ?sink.path(), dry_run = req.flags.dry_run, "validation started");

        let driven = self.drive(req, &sink, &mut core, &mut live).await;
        self.teardown(&mut live).await;
        let result = driven?;

        let likely = self.finalize(req, &sink, result, core.attempts())?;

        info!(result = %result, attempts = core.attempts(), "validation finished");
        Ok(ValidationOutcome {
            result,
            sink: sink.path().to_path_buf(),
            attempts: core.attempts(),
            states: core.trace().to_vec(),
            likely_cause: likely,
        })
    }

    async fn drive(
        &mut self,
        req: &ValidationRequest,
        sink: &Sink,
        core: &mut ValidationCore,
        live: &mut LiveRun,
    ) -> Result<ValidationResult> {
        let port_busy = !req.flags.dry_run && self.probe.port_in_use(req.port).await;
        if port_busy {
            warn!(port = req.port, "port is already in use; not starting anything");
            sink.append_diagnostic(&format!("Port {} is already in use", req.port))?;
        }
        let mut action = core.step(StepEvent::Begin { port_busy })?;

        loop {
            debug!(?action, state = ?core.state(), "next action");

            let event = match action {
                StepAction::Finish(result) => return Ok(result),
                _ if self.cancel.is_cancelled() => StepEvent::Interrupted,
                StepAction::Compile => self.compile(req, sink).await?,
                StepAction::Launch => self.launch(req, sink, live).await?,
                StepAction::AwaitMarker => self.await_marker(req, sink, live).await?,
                StepAction::AwaitReady => self.await_ready(req, sink).await?,
                StepAction::AwaitBundle => self.await_bundle(req, sink, live).await?,
                StepAction::RunTests => self.run_tests(req, sink).await?,
                StepAction::Restart { attempt } => self.restart(sink, live, attempt).await?,
            };

            action = core.step(event)?;
        }
    }

    fn command_spec(&self, req: &ValidationRequest, sink: &Sink, step: &str, command: &str) -> CommandSpec {
        let command = if req.flags.offline {
            with_offline_flag(command)
        } else {
            command.to_string()
        };
        CommandSpec {
            label: format!("{}-{}-{step}", req.app, req.mode),
            command,
            sink: sink.path().to_path_buf(),
            work_dir: req.work_dir.clone(),
            env: Vec::new(),
            timeout: self.config.timing.compile_timeout,
            verbose: req.flags.verbose,
            dry_run: req.flags.dry_run,
        }
    }

    async fn compile(&mut self, req: &ValidationRequest, sink: &Sink) -> Result<StepEvent> {
        let spec = self.command_spec(req, sink, "compile", &req.compile);
        let exit_code = tokio::select! {
            res = self.backend.run_foreground(&spec) => res?,
            _ = self.cancel.cancelled() => return Ok(StepEvent::Interrupted),
        };
        if exit_code != 0 {
            warn!(exit_code, "compilation failed");
        }
        Ok(StepEvent::Compiled { exit_code })
    }

    async fn launch(
        &mut self,
        req: &ValidationRequest,
        sink: &Sink,
        live: &mut LiveRun,
    ) -> Result<StepEvent> {
        let spec = self.command_spec(req, sink, "run", &req.run);
        let launch = tokio::select! {
            res = self.backend.run_background(&spec) => res?,
            _ = self.cancel.cancelled() => return Ok(StepEvent::Interrupted),
        };

        match launch {
            Launch::Running(process) => {
                info!(pid = ?process.pid(), "application launched");
                live.process = Some(process);
                if req.flags.verbose && !req.flags.dry_run {
                    live.tail = Some(TailHandle::spawn(
                        sink.path().to_path_buf(),
                        self.config.timing.tail_poll,
                    ));
                }
                Ok(StepEvent::Launched)
            }
            Launch::DeadOnArrival { exit_code } => {
                warn!(?exit_code, "application exited right after launch");
                Ok(StepEvent::DeadOnArrival { exit_code })
            }
        }
    }

    /// Marker wait bound to the liveness of the run-process.
    async fn wait_for(
        &self,
        sink: &Sink,
        marker: &Marker,
        timeout: std::time::Duration,
        live: &mut LiveRun,
    ) -> Result<WaitOutcome> {
        let poll = self.config.timing.marker_poll;
        match live.process.as_mut() {
            Some(process) => {
                await_pattern(sink, marker, timeout, poll, &self.cancel, || process.is_alive()).await
            }
            None => await_pattern(sink, marker, timeout, poll, &self.cancel, || false).await,
        }
    }

    async fn await_marker(
        &mut self,
        req: &ValidationRequest,
        sink: &Sink,
        live: &mut LiveRun,
    ) -> Result<StepEvent> {
        if req.flags.dry_run {
            return Ok(StepEvent::MarkerFound);
        }

        let reason = match self.wait_for(sink, &req.marker, req.timeout, live).await? {
            WaitOutcome::Found { .. } => return Ok(StepEvent::MarkerFound),
            WaitOutcome::Cancelled => return Ok(StepEvent::Interrupted),
            WaitOutcome::TimedOut => {
                sink.append_diagnostic(&format!(
                    "Timeout: could not find '{}' after {} secs",
                    req.marker,
                    req.timeout.as_secs()
                ))?;
                MarkerMiss::TimedOut
            }
            WaitOutcome::ProcessDied => {
                sink.append_diagnostic(&format!(
                    "Process died before '{}' was printed",
                    req.marker
                ))?;
                MarkerMiss::ProcessDied
            }
        };

        let config_rewritten = self.config.detector.was_config_rewritten(sink)?;
        Ok(StepEvent::MarkerMissed {
            reason,
            config_rewritten,
        })
    }

    async fn await_ready(&mut self, req: &ValidationRequest, sink: &Sink) -> Result<StepEvent> {
        if req.flags.dry_run {
            return Ok(StepEvent::Ready);
        }

        let timeout = self.config.timing.readiness_timeout;
        // An error status next to the rewrite marker is the recoverable
        // failure; stop probing at the first one.
        let detector = &self.config.detector;
        let rewritten = || sink.read().is_ok_and(|contents| detector.matches(&contents));
        match self.probe.await_ready(req.port, timeout, &self.cancel, &rewritten).await {
            ProbeOutcome::Ready { pending_secs } => {
                sink.append_diagnostic(&format!("Checked that port {} is listening", req.port))?;
                sink.append_diagnostic(&format!(
                    "Checked that frontend is compiled and dev-mode is ready after {pending_secs} secs"
                ))?;
            }
            ProbeOutcome::Cancelled => return Ok(StepEvent::Interrupted),
            ProbeOutcome::PortClosed => {
                sink.append_diagnostic(&format!(
                    "Server not listening in port {} after {} secs",
                    req.port,
                    timeout.as_secs()
                ))?;
                let config_rewritten = self.config.detector.was_config_rewritten(sink)?;
                return Ok(StepEvent::NotReady { config_rewritten });
            }
            ProbeOutcome::NotReady { last_status } => {
                let status = last_status.map_or_else(|| "no response".to_string(), |s| s.to_string());
                sink.append_diagnostic(&format!("Server at {} not ready ({status})", req.base_url()))?;
                let config_rewritten = self.config.detector.was_config_rewritten(sink)?;
                return Ok(StepEvent::NotReady { config_rewritten });
            }
        }

        if req.mode == Mode::Prod {
            self.report_deprecations(sink)?;
        }
        if req.flags.interactive {
            self.pause_for_user(&req.base_url()).await;
        }
        Ok(StepEvent::Ready)
    }

    async fn await_bundle(
        &mut self,
        req: &ValidationRequest,
        sink: &Sink,
        live: &mut LiveRun,
    ) -> Result<StepEvent> {
        if req.flags.dry_run {
            return Ok(StepEvent::BundleChecked {
                found: true,
                config_rewritten: false,
            });
        }

        let marker = self.config.bundle_marker.clone();
        let timeout = self.config.timing.bundle_timeout;
        match self.wait_for(sink, &marker, timeout, live).await? {
            WaitOutcome::Found { .. } => Ok(StepEvent::BundleChecked {
                found: true,
                config_rewritten: false,
            }),
            WaitOutcome::Cancelled => Ok(StepEvent::Interrupted),
            WaitOutcome::TimedOut | WaitOutcome::ProcessDied => {
                warn!(marker = %marker, "bundle marker not seen; the app might be slow or failing");
                let config_rewritten = self.config.detector.was_config_rewritten(sink)?;
                Ok(StepEvent::BundleChecked {
                    found: false,
                    config_rewritten,
                })
            }
        }
    }

    async fn run_tests(&mut self, req: &ValidationRequest, sink: &Sink) -> Result<StepEvent> {
        if req.flags.dry_run {
            return Ok(StepEvent::TestsFinished { passed: true });
        }
        let Some(test_file) = req.test_file.clone() else {
            return Ok(StepEvent::TestsFinished { passed: true });
        };

        let run = BrowserTestRun {
            app: req.app.clone(),
            mode: req.mode,
            version: req.version.clone(),
            test_file,
            base_url: req.base_url(),
            sink: sink.path().to_path_buf(),
            work_dir: req.work_dir.clone(),
            headed: req.flags.headed,
            verbose: req.flags.verbose,
        };
        let passed = tokio::select! {
            res = self.tests.run(&run) => res?,
            _ = self.cancel.cancelled() => return Ok(StepEvent::Interrupted),
        };
        if !passed {
            warn!(test_file = ?run.test_file, "browser tests failed");
        }
        Ok(StepEvent::TestsFinished { passed })
    }

    async fn restart(&mut self, sink: &Sink, live: &mut LiveRun, attempt: u32) -> Result<StepEvent> {
        info!(
            attempt,
            max_attempts = self.config.max_launch_attempts,
            "generated config was rewritten; restarting application"
        );
        sink.append_diagnostic(&format!(
            "config file modified, retrying ({attempt}/{})",
            self.config.max_launch_attempts
        ))?;
        self.teardown(live).await;
        let backup = sink.rotate(attempt - 1)?;
        debug!(backup = ?backup, "previous attempt output kept");
        Ok(StepEvent::Restarted)
    }

    /// Stop the tail and the run-process. Safe to call repeatedly.
    async fn teardown(&self, live: &mut LiveRun) {
        if let Some(tail) = live.tail.take() {
            tail.stop().await;
        }
        if let Some(mut process) = live.process.take() {
            if let Err(e) = process.terminate(self.config.timing.terminate_grace).await {
                warn!(label = process.label(), error = %e, "terminating application failed");
            }
        }
    }

    /// Remove the sink on success, report on failure.
    fn finalize(
        &self,
        req: &ValidationRequest,
        sink: &Sink,
        result: ValidationResult,
        attempts: u32,
    ) -> Result<Option<ErrorFamily>> {
        if result.is_passed() {
            if req.flags.dry_run {
                info!(sink = ?sink.path(), "dry-run: keeping recorded commands");
            } else {
                sink.remove_with_backups(attempts)?;
            }
            return Ok(None);
        }

        let contents = sink.read()?;
        let findings = scan_errors(&contents);
        for finding in &findings {
            warn!(family = %finding.family, "{}", finding.line);
        }
        let cause = likely_cause(&findings);
        if let Some(family) = cause {
            warn!(family = %family, "likely cause");
        }

        self.config
            .step_summary
            .report_sink(sink, &format!("{}: {}", req.app, result.headline()));
        warn!(sink = ?sink.path(), result = %result, "validation failed; output kept");
        Ok(cause)
    }

    fn report_deprecations(&self, sink: &Sink) -> Result<()> {
        let lines = scan_deprecations(&sink.read()?);
        if lines.is_empty() {
            return Ok(());
        }
        warn!(count = lines.len(), "deprecated API usage");
        for line in &lines {
            warn!("{line}");
        }
        Ok(())
    }

    async fn pause_for_user(&self, url: &str) {
        info!(url, "application is running; press Enter to continue");
        let mut line = String::new();
        let mut stdin = BufReader::new(tokio::io::stdin());
        tokio::select! {
            res = stdin.read_line(&mut line) => {
                if let Err(e) = res {
                    debug!(error = %e, "reading stdin failed");
                }
            }
            _ = self.cancel.cancelled() => {}
        }
    }
}
