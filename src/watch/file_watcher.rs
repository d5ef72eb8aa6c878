// src/watch/file_watcher.rs

//! Poll a growing sink for a marker.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::sink::Sink;
use crate::watch::marker::Marker;

/// Result of [`await_pattern`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The marker was found after the given number of whole seconds.
    Found { after_secs: u64 },
    TimedOut,
    /// The liveness check reported the producing process as gone.
    ProcessDied,
    Cancelled,
}

/// Wait until `marker` appears in `sink`.
///
/// Each tick:
/// 1. if `cancel` fired, return `Cancelled`;
/// 2. ask `is_alive`; a dead producer can never print the marker, so return
///    `ProcessDied` straight away instead of sitting out the timeout;
/// 3. re-read the whole sink and search it.
///
/// On a match a `>>>> PiT: Found '<marker>' after <N> secs` line is appended
/// to the sink. The timeout is measured from the call.
pub async fn await_pattern<F>(
    sink: &Sink,
    marker: &Marker,
    timeout: Duration,
    poll: Duration,
    cancel: &CancellationToken,
    mut is_alive: F,
) -> Result<WaitOutcome>
where
    F: FnMut() -> bool,
{
    info!(
        sink = ?sink.path(),
        marker = %marker,
        timeout_secs = timeout.as_secs(),
        "waiting for marker"
    );

    let start = Instant::now();

    loop {
        if cancel.is_cancelled() {
            debug!(marker = %marker, "marker wait cancelled");
            return Ok(WaitOutcome::Cancelled);
        }

        if !is_alive() {
            warn!(marker = %marker, "process died while waiting for marker");
            return Ok(WaitOutcome::ProcessDied);
        }

        let contents = sink.read()?;
        if marker.is_match(&contents) {
            let after_secs = start.elapsed().as_secs();
            info!(marker = %marker, after_secs, "found marker");
            sink.append_diagnostic(&format!("Found '{marker}' after {after_secs} secs"))?;
            return Ok(WaitOutcome::Found { after_secs });
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            warn!(
                marker = %marker,
                timeout_secs = timeout.as_secs(),
                "timeout waiting for marker"
            );
            return Ok(WaitOutcome::TimedOut);
        }

        let tick = poll.min(timeout - elapsed);
        tokio::select! {
            _ = sleep(tick) => {}
            _ = cancel.cancelled() => {}
        }
    }
}
