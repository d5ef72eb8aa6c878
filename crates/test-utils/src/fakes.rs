//! Scripted stand-ins for the orchestrator's seams.

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use pit_runner::collab::{BrowserTestRun, BrowserTestRunner};
use pit_runner::errors::Result;
use pit_runner::exec::{BoxFuture, CommandSpec, Launch, ManagedProcess, ProcessBackend};
use pit_runner::probe::{ProbeOutcome, ReadinessCheck, SettleOnError};

/// What the fake backend records.
#[derive(Debug, Default, Clone)]
pub struct BackendLog {
    pub foreground: Vec<String>,
    pub background: Vec<String>,
    pub terminations: usize,
    pub live: usize,
    pub max_live: usize,
}

/// Script for one background launch.
#[derive(Debug, Clone)]
pub enum FakeLaunch {
    /// Survives the launch. `output` is appended to the sink after `delay`;
    /// the process reports itself dead once `dies_after` has passed.
    Running {
        output: Vec<String>,
        delay: Duration,
        dies_after: Option<Duration>,
    },
    DeadOnArrival { exit_code: Option<i32> },
}

impl FakeLaunch {
    pub fn printing(lines: &[&str]) -> Self {
        FakeLaunch::Running {
            output: lines.iter().map(|l| l.to_string()).collect(),
            delay: Duration::ZERO,
            dies_after: None,
        }
    }

    pub fn printing_after(delay: Duration, lines: &[&str]) -> Self {
        FakeLaunch::Running {
            output: lines.iter().map(|l| l.to_string()).collect(),
            delay,
            dies_after: None,
        }
    }

    pub fn dying_after(dies_after: Duration, lines: &[&str]) -> Self {
        FakeLaunch::Running {
            output: lines.iter().map(|l| l.to_string()).collect(),
            delay: Duration::ZERO,
            dies_after: Some(dies_after),
        }
    }

    pub fn dead(exit_code: i32) -> Self {
        FakeLaunch::DeadOnArrival {
            exit_code: Some(exit_code),
        }
    }
}

fn append_lines(path: &Path, lines: &[String]) {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("open sink");
    for line in lines {
        writeln!(file, "{line}").expect("write sink");
    }
}

/// A `ProcessBackend` that never spawns anything.
///
/// Foreground commands append their scripted output and return the scripted
/// exit code. Background commands follow the launch script; once it runs
/// out, `fallback` is used for every further launch.
pub struct FakeBackend {
    compile_exit: i32,
    compile_output: Vec<String>,
    launches: VecDeque<FakeLaunch>,
    fallback: FakeLaunch,
    log: Arc<Mutex<BackendLog>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            compile_exit: 0,
            compile_output: Vec::new(),
            launches: VecDeque::new(),
            fallback: FakeLaunch::printing(&[]),
            log: Arc::new(Mutex::new(BackendLog::default())),
        }
    }

    pub fn compile_exit(mut self, code: i32) -> Self {
        self.compile_exit = code;
        self
    }

    pub fn compile_output(mut self, line: &str) -> Self {
        self.compile_output.push(line.to_string());
        self
    }

    pub fn launch(mut self, launch: FakeLaunch) -> Self {
        self.launches.push_back(launch);
        self
    }

    pub fn always(mut self, launch: FakeLaunch) -> Self {
        self.fallback = launch;
        self
    }

    /// Shared view of what happened, usable after the backend was moved.
    pub fn log(&self) -> Arc<Mutex<BackendLog>> {
        Arc::clone(&self.log)
    }

    pub fn snapshot(&self) -> BackendLog {
        self.log.lock().unwrap().clone()
    }
}

impl ProcessBackend for FakeBackend {
    fn run_foreground<'a>(&'a mut self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<i32>> {
        Box::pin(async move {
            self.log.lock().unwrap().foreground.push(spec.command.clone());
            append_lines(&spec.sink, &self.compile_output);
            Ok(self.compile_exit)
        })
    }

    fn run_background<'a>(&'a mut self, spec: &'a CommandSpec) -> BoxFuture<'a, Result<Launch>> {
        Box::pin(async move {
            self.log.lock().unwrap().background.push(spec.command.clone());
            let script = self
                .launches
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone());

            match script {
                FakeLaunch::DeadOnArrival { exit_code } => Ok(Launch::DeadOnArrival { exit_code }),
                FakeLaunch::Running {
                    output,
                    delay,
                    dies_after,
                } => {
                    if delay.is_zero() {
                        append_lines(&spec.sink, &output);
                    } else {
                        let sink = spec.sink.clone();
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            append_lines(&sink, &output);
                        });
                    }
                    {
                        let mut log = self.log.lock().unwrap();
                        log.live += 1;
                        log.max_live = log.max_live.max(log.live);
                    }
                    Ok(Launch::Running(Box::new(FakeProcess {
                        label: spec.label.clone(),
                        dies_at: dies_after.map(|d| Instant::now() + d),
                        terminated: false,
                        log: Arc::clone(&self.log),
                    })))
                }
            }
        })
    }
}

struct FakeProcess {
    label: String,
    dies_at: Option<Instant>,
    terminated: bool,
    log: Arc<Mutex<BackendLog>>,
}

impl ManagedProcess for FakeProcess {
    fn label(&self) -> &str {
        &self.label
    }

    fn pid(&self) -> Option<u32> {
        None
    }

    fn is_alive(&mut self) -> bool {
        !self.terminated && self.dies_at.is_none_or(|t| Instant::now() < t)
    }

    fn terminate(&mut self, _grace: Duration) -> BoxFuture<'_, Result<()>> {
        if !self.terminated {
            self.terminated = true;
            let mut log = self.log.lock().unwrap();
            log.terminations += 1;
            log.live -= 1;
        }
        Box::pin(async { Ok(()) })
    }
}

/// Scripted readiness outcomes; the last one repeats.
pub struct FakeProbe {
    port_busy: bool,
    outcomes: VecDeque<ProbeOutcome>,
    last: ProbeOutcome,
    calls: Arc<Mutex<usize>>,
}

impl Default for FakeProbe {
    fn default() -> Self {
        Self::ready()
    }
}

impl FakeProbe {
    pub fn ready() -> Self {
        Self::scripted(&[ProbeOutcome::Ready { pending_secs: 0 }])
    }

    pub fn scripted(outcomes: &[ProbeOutcome]) -> Self {
        let last = outcomes
            .last()
            .copied()
            .unwrap_or(ProbeOutcome::Ready { pending_secs: 0 });
        Self {
            port_busy: false,
            outcomes: outcomes.iter().copied().collect(),
            last,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_busy_port(mut self) -> Self {
        self.port_busy = true;
        self
    }

    pub fn calls(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.calls)
    }
}

impl ReadinessCheck for FakeProbe {
    fn port_in_use(&mut self, _port: u16) -> BoxFuture<'_, bool> {
        let busy = self.port_busy;
        Box::pin(async move { busy })
    }

    fn await_ready<'a>(
        &'a mut self,
        _port: u16,
        _timeout: Duration,
        cancel: &'a CancellationToken,
        _settle_on_error: &'a SettleOnError<'a>,
    ) -> BoxFuture<'a, ProbeOutcome> {
        *self.calls.lock().unwrap() += 1;
        let outcome = self.outcomes.pop_front().unwrap_or(self.last);
        let cancelled = cancel.is_cancelled();
        Box::pin(async move {
            if cancelled {
                ProbeOutcome::Cancelled
            } else {
                outcome
            }
        })
    }
}

/// Browser tests with a fixed verdict; records every run.
#[derive(Clone)]
pub struct FakeBrowserTests {
    passed: bool,
    runs: Arc<Mutex<Vec<BrowserTestRun>>>,
}

impl FakeBrowserTests {
    pub fn passing() -> Self {
        Self {
            passed: true,
            runs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing() -> Self {
        Self {
            passed: false,
            runs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn runs(&self) -> Vec<BrowserTestRun> {
        self.runs.lock().unwrap().clone()
    }
}

impl BrowserTestRunner for FakeBrowserTests {
    fn run<'a>(&'a mut self, run: &'a BrowserTestRun) -> BoxFuture<'a, Result<bool>> {
        self.runs.lock().unwrap().push(run.clone());
        let passed = self.passed;
        Box::pin(async move { Ok(passed) })
    }
}
