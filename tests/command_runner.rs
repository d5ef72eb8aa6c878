// tests/command_runner.rs
#![cfg(unix)]

mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};

use pit_runner::exec::{
    CommandRunner, CommandSpec, Launch, ManagedProcess, ProcessBackend, ProcessRegistry,
    TIMEOUT_EXIT_CODE,
};
use pit_runner::timing::Timing;

type TestResult = Result<(), Box<dyn Error>>;

fn spec(label: &str, command: &str, sink: &Path) -> CommandSpec {
    CommandSpec {
        label: label.to_string(),
        command: command.to_string(),
        sink: sink.to_path_buf(),
        work_dir: None,
        env: Vec::new(),
        timeout: Duration::from_secs(10),
        verbose: false,
        dry_run: false,
    }
}

fn runner() -> (CommandRunner, ProcessRegistry) {
    let registry = ProcessRegistry::new();
    (CommandRunner::new(Timing::fast(), registry.clone()), registry)
}

#[tokio::test]
async fn foreground_captures_both_streams_and_exit_code() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = dir.path().join("app.out");
    let (mut runner, registry) = runner();

    let code = with_timeout(runner.run_foreground(&spec(
        "compile",
        "echo to-stdout; echo to-stderr >&2; exit 3",
        &sink,
    )))
    .await?;

    assert_eq!(code, 3);
    let out = fs::read_to_string(&sink)?;
    assert!(out.contains("to-stdout"));
    assert!(out.contains("to-stderr"));
    assert!(registry.is_empty());
    Ok(())
}

#[tokio::test]
async fn foreground_honours_work_dir_and_env() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = dir.path().join("app.out");
    let (mut runner, _) = runner();

    let mut s = spec("compile", "pwd; echo \"greeting=$PIT_GREETING\"", &sink);
    s.work_dir = Some(dir.path().to_path_buf());
    s.env.push(("PIT_GREETING".to_string(), "hello".to_string()));
    let code = with_timeout(runner.run_foreground(&s)).await?;

    assert_eq!(code, 0);
    let out = fs::read_to_string(&sink)?;
    assert!(out.contains("greeting=hello"));
    let dir_name = dir.path().file_name().unwrap().to_string_lossy().into_owned();
    assert!(out.contains(&dir_name));
    Ok(())
}

#[tokio::test]
async fn foreground_timeout_kills_and_returns_124() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = dir.path().join("app.out");
    let (mut runner, registry) = runner();

    let mut s = spec("compile", "sleep 30", &sink);
    s.timeout = Duration::from_millis(200);
    let start = Instant::now();
    let code = with_timeout(runner.run_foreground(&s)).await?;

    assert_eq!(code, TIMEOUT_EXIT_CODE);
    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(fs::read_to_string(&sink)?.contains(">>>> PiT: Command 'sleep 30' timed out"));
    assert!(registry.is_empty());
    Ok(())
}

#[tokio::test]
async fn background_exit_during_grace_is_dead_on_arrival() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = dir.path().join("app.out");
    let (mut runner, registry) = runner();

    let launch = with_timeout(runner.run_background(&spec("run", "echo bye; exit 7", &sink))).await?;

    match launch {
        Launch::DeadOnArrival { exit_code } => assert_eq!(exit_code, Some(7)),
        Launch::Running(_) => panic!("expected dead on arrival"),
    }
    assert!(fs::read_to_string(&sink)?.contains("bye"));
    assert!(registry.is_empty());
    Ok(())
}

#[tokio::test]
async fn background_process_terminates_idempotently() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = dir.path().join("app.out");
    let (mut runner, registry) = runner();

    let launch = with_timeout(runner.run_background(&spec("run", "echo up; sleep 30", &sink))).await?;
    let Launch::Running(mut process) = launch else {
        panic!("expected a running process");
    };

    assert!(process.is_alive());
    assert!(process.pid().is_some());
    assert_eq!(registry.pid_of("run"), process.pid());

    with_timeout(process.terminate(Duration::from_millis(500))).await?;
    assert!(!process.is_alive());
    assert!(registry.is_empty());

    with_timeout(process.terminate(Duration::from_millis(500))).await?;
    assert!(!process.is_alive());
    assert!(fs::read_to_string(&sink)?.contains("up"));
    Ok(())
}

#[tokio::test]
async fn terminate_escalates_when_term_is_ignored() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = dir.path().join("app.out");
    let (mut runner, _) = runner();

    let launch = with_timeout(runner.run_background(&spec(
        "stubborn",
        "trap '' TERM; while true; do sleep 1; done",
        &sink,
    )))
    .await?;
    let Launch::Running(mut process) = launch else {
        panic!("expected a running process");
    };

    let start = Instant::now();
    with_timeout(process.terminate(Duration::from_millis(200))).await?;

    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(!process.is_alive());
    Ok(())
}

#[tokio::test]
async fn dry_run_records_without_running() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = dir.path().join("app.out");
    let touched = dir.path().join("touched");
    let (mut runner, registry) = runner();

    let mut fg = spec("compile", &format!("touch {}", touched.display()), &sink);
    fg.dry_run = true;
    let mut bg = spec("run", "sleep 30", &sink);
    bg.dry_run = true;

    assert_eq!(runner.run_foreground(&fg).await?, 0);
    let Launch::Running(mut process) = runner.run_background(&bg).await? else {
        panic!("dry-run launches always report running");
    };

    assert_eq!(process.pid(), None);
    process.terminate(Duration::from_millis(10)).await?;
    assert!(!touched.exists());
    assert!(registry.is_empty());
    assert_eq!(
        fs::read_to_string(&sink)?,
        format!("# touch {}\n# sleep 30\n", touched.display())
    );
    Ok(())
}
