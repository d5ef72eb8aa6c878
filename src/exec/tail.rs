// src/exec/tail.rs

//! Verbose "tail -f" of a sink to stdout.
//!
//! Purely cosmetic: it never influences control flow and its failures are
//! only logged at debug level.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle of a running tail task.
#[derive(Debug)]
pub struct TailHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl TailHandle {
    /// Start tailing `sink` from its current end.
    pub fn spawn(sink: PathBuf, poll: Duration) -> Self {
        let stop = CancellationToken::new();
        let task = tokio::spawn(tail_loop(sink, poll, stop.clone()));
        Self { stop, task }
    }

    /// Stop the task and wait for it to flush.
    pub async fn stop(self) {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            debug!(error = %e, "tail task ended abnormally");
        }
    }
}

async fn tail_loop(sink: PathBuf, poll: Duration, stop: CancellationToken) {
    let mut offset = tokio::fs::metadata(&sink).await.map(|m| m.len()).unwrap_or(0);
    let mut stdout = tokio::io::stdout();
    let mut buf = Vec::new();

    loop {
        let stopping = stop.is_cancelled();

        match read_from(&sink, offset, &mut buf).await {
            Ok(n) if n > 0 => {
                offset += n as u64;
                let _ = stdout.write_all(&buf).await;
                let _ = stdout.flush().await;
            }
            Ok(_) => {}
            Err(e) => debug!(sink = ?sink, error = %e, "tail read failed"),
        }

        if stopping {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(poll) => {}
            _ = stop.cancelled() => {}
        }
    }
}

async fn read_from(sink: &Path, offset: u64, buf: &mut Vec<u8>) -> std::io::Result<usize> {
    buf.clear();
    let mut file = tokio::fs::File::open(sink).await?;
    let len = file.metadata().await?.len();
    if len < offset {
        // Truncated or rotated underneath us; nothing sensible to show.
        return Ok(0);
    }
    file.seek(SeekFrom::Start(offset)).await?;
    file.read_to_end(buf).await
}
