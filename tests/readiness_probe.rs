// tests/readiness_probe.rs

mod common;
use crate::common::{init_tracing, serve_http, with_timeout, HTTP_ERROR, HTTP_OK};

use std::error::Error;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use pit_runner::probe::{
    default_pending_predicate, never_settle, ProbeOutcome, ReadinessCheck, ReadinessProbe,
};
use pit_runner::timing::Timing;

type TestResult = Result<(), Box<dyn Error>>;

fn probe() -> Result<ReadinessProbe, Box<dyn Error>> {
    Ok(ReadinessProbe::new(Timing::fast(), default_pending_predicate())?)
}

#[tokio::test]
async fn ready_once_server_answers_ok() -> TestResult {
    init_tracing();
    let (port, requests) = serve_http(0, HTTP_OK).await?;
    let mut probe = probe()?;

    let outcome = with_timeout(probe.await_ready(port, Duration::from_secs(2), &CancellationToken::new(), &never_settle)).await;

    assert_eq!(outcome, ProbeOutcome::Ready { pending_secs: 0 });
    assert_eq!(requests.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn single_pending_answer_is_retried_then_ready() -> TestResult {
    init_tracing();
    let (port, requests) = serve_http(1, HTTP_OK).await?;
    let mut probe = probe()?;

    let outcome = with_timeout(probe.await_ready(port, Duration::from_secs(2), &CancellationToken::new(), &never_settle)).await;

    assert_eq!(outcome, ProbeOutcome::Ready { pending_secs: 0 });
    assert_eq!(requests.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn pending_time_is_not_charged_to_the_timeout() -> TestResult {
    init_tracing();
    // 10 pending answers at 20ms each outlast the 150ms budget.
    let (port, requests) = serve_http(10, HTTP_OK).await?;
    let mut probe = probe()?;

    let outcome =
        with_timeout(probe.await_ready(port, Duration::from_millis(150), &CancellationToken::new(), &never_settle)).await;

    assert_eq!(outcome, ProbeOutcome::Ready { pending_secs: 0 });
    assert_eq!(requests.load(Ordering::SeqCst), 11);
    Ok(())
}

#[tokio::test]
async fn wrong_status_until_timeout_is_not_ready() -> TestResult {
    init_tracing();
    let (port, requests) = serve_http(0, HTTP_ERROR).await?;
    let mut probe = probe()?;

    let outcome =
        with_timeout(probe.await_ready(port, Duration::from_millis(200), &CancellationToken::new(), &never_settle)).await;

    assert_eq!(outcome, ProbeOutcome::NotReady { last_status: Some(500) });
    assert!(requests.load(Ordering::SeqCst) >= 2);
    Ok(())
}

#[tokio::test]
async fn closed_port_is_reported() -> TestResult {
    init_tracing();
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        listener.local_addr()?.port()
    };
    let mut probe = probe()?;

    assert!(!probe.port_in_use(port).await);
    let outcome =
        with_timeout(probe.await_ready(port, Duration::from_millis(200), &CancellationToken::new(), &never_settle)).await;
    assert_eq!(outcome, ProbeOutcome::PortClosed);
    Ok(())
}

#[tokio::test]
async fn bound_port_is_in_use() -> TestResult {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let mut probe = probe()?;

    assert!(probe.port_in_use(port).await);
    Ok(())
}

#[tokio::test]
async fn cancelled_probe_returns_promptly() -> TestResult {
    init_tracing();
    let (port, _) = serve_http(usize::MAX, HTTP_OK).await?;
    let mut probe = probe()?;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let outcome = with_timeout(probe.await_ready(port, Duration::from_secs(30), &cancel, &never_settle)).await;
    assert_eq!(outcome, ProbeOutcome::Cancelled);
    Ok(())
}

#[tokio::test]
async fn explained_error_status_ends_the_wait_at_once() -> TestResult {
    init_tracing();
    let (port, requests) = serve_http(0, HTTP_ERROR).await?;
    let mut probe = probe()?;
    let rewritten = || true;

    let outcome = with_timeout(probe.await_ready(
        port,
        Duration::from_secs(30),
        &CancellationToken::new(),
        &rewritten,
    ))
    .await;

    assert_eq!(outcome, ProbeOutcome::NotReady { last_status: Some(500) });
    assert_eq!(requests.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn settle_check_is_not_asked_while_frontend_is_pending() -> TestResult {
    init_tracing();
    let (port, _) = serve_http(3, HTTP_OK).await?;
    let mut probe = probe()?;
    let rewritten = || true;

    let outcome = with_timeout(probe.await_ready(
        port,
        Duration::from_secs(2),
        &CancellationToken::new(),
        &rewritten,
    ))
    .await;

    assert_eq!(outcome, ProbeOutcome::Ready { pending_secs: 0 });
    Ok(())
}
