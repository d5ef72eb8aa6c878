// src/probe/port.rs

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortWait {
    Open,
    Closed,
    Cancelled,
}

/// One connect attempt to `localhost:port`, bounded by `timeout`.
pub async fn is_listening(port: u16, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(("localhost", port))).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!(port, error = %e, "port not accepting connections");
            false
        }
        Err(_) => false,
    }
}

/// Attempt a connect every `poll` until one succeeds or `timeout` elapses.
pub async fn await_port(
    port: u16,
    timeout: Duration,
    poll: Duration,
    cancel: &CancellationToken,
) -> PortWait {
    info!(port, timeout_secs = timeout.as_secs(), "waiting for port");
    let start = Instant::now();

    loop {
        if cancel.is_cancelled() {
            return PortWait::Cancelled;
        }
        if is_listening(port, poll.max(Duration::from_millis(100))).await {
            info!(port, after_secs = start.elapsed().as_secs(), "port is listening");
            return PortWait::Open;
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            warn!(port, timeout_secs = timeout.as_secs(), "port not listening before timeout");
            return PortWait::Closed;
        }
        tokio::select! {
            _ = sleep(poll.min(timeout - elapsed)) => {}
            _ = cancel.cancelled() => {}
        }
    }
}
