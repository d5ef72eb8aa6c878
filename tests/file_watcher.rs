// tests/file_watcher.rs

mod common;
use crate::common::{init_tracing, with_timeout};

use std::error::Error;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use pit_runner::sink::Sink;
use pit_runner::watch::{await_pattern, Marker, WaitOutcome};

type TestResult = Result<(), Box<dyn Error>>;

const POLL: Duration = Duration::from_millis(20);

#[tokio::test]
async fn finds_marker_written_after_the_wait_started() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = Sink::create(dir.path().join("app.out"))?;
    let writer = sink.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        writer.append_line("Tomcat started on port 8080").ok();
    });

    let marker = Marker::regex(r"started on port \d+")?;
    let outcome = with_timeout(await_pattern(
        &sink,
        &marker,
        Duration::from_secs(5),
        POLL,
        &CancellationToken::new(),
        || true,
    ))
    .await?;

    assert_eq!(outcome, WaitOutcome::Found { after_secs: 0 });
    let contents = sink.read()?;
    assert!(contents.ends_with(">>>> PiT: Found 'started on port \\d+' after 0 secs\n"));
    Ok(())
}

#[tokio::test]
async fn literal_marker_is_not_a_regex() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = Sink::create(dir.path().join("app.out"))?;
    sink.append_line("Frontend compiled (100%)")?;

    let outcome = await_pattern(
        &sink,
        &Marker::literal("compiled (100%)"),
        Duration::from_millis(100),
        POLL,
        &CancellationToken::new(),
        || true,
    )
    .await?;
    assert!(matches!(outcome, WaitOutcome::Found { .. }));
    Ok(())
}

#[tokio::test]
async fn dead_producer_ends_the_wait_early() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = Sink::create(dir.path().join("app.out"))?;

    let mut ticks = 0;
    let start = Instant::now();
    let outcome = with_timeout(await_pattern(
        &sink,
        &Marker::literal("never printed"),
        Duration::from_secs(60),
        POLL,
        &CancellationToken::new(),
        || {
            ticks += 1;
            ticks < 3
        },
    ))
    .await?;

    assert_eq!(outcome, WaitOutcome::ProcessDied);
    assert!(start.elapsed() < Duration::from_secs(1));
    Ok(())
}

#[tokio::test]
async fn times_out_without_marker() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = Sink::create(dir.path().join("app.out"))?;
    sink.append_line("booting...")?;

    let start = Instant::now();
    let outcome = with_timeout(await_pattern(
        &sink,
        &Marker::literal("ready"),
        Duration::from_millis(150),
        POLL,
        &CancellationToken::new(),
        || true,
    ))
    .await?;

    assert_eq!(outcome, WaitOutcome::TimedOut);
    assert!(start.elapsed() >= Duration::from_millis(150));
    assert_eq!(sink.read()?, "booting...\n");
    Ok(())
}

#[tokio::test]
async fn cancellation_wins_over_a_long_timeout() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sink = Sink::create(dir.path().join("app.out"))?;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let outcome = with_timeout(await_pattern(
        &sink,
        &Marker::literal("ready"),
        Duration::from_secs(60),
        Duration::from_secs(10),
        &cancel,
        || true,
    ))
    .await?;

    assert_eq!(outcome, WaitOutcome::Cancelled);
    Ok(())
}
