#![allow(dead_code)]

pub use pit_test_utils::{init_tracing, with_timeout};

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use pit_runner::collab::BrowserTestRunner;
use pit_runner::engine::{OrchestratorConfig, ValidationOrchestrator};
use pit_runner::exec::ProcessBackend;
use pit_runner::probe::ReadinessCheck;
use pit_runner::timing::Timing;

pub const STARTED: &str = "Started Application in 2.1 seconds";
pub const REWRITTEN: &str = "INFO  'tsconfig.json' has been updated.";
pub const BUNDLE_BUILT: &str = "Development frontend bundle built in 1234 ms";

/// Default settings with millisecond ticks.
pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        timing: Timing::fast(),
        ..OrchestratorConfig::default()
    }
}

pub fn orchestrator<B, P, T>(backend: B, probe: P, tests: T) -> ValidationOrchestrator<B, P, T>
where
    B: ProcessBackend,
    P: ReadinessCheck,
    T: BrowserTestRunner,
{
    ValidationOrchestrator::new(backend, probe, tests, fast_config(), CancellationToken::new())
}

pub const HTTP_PENDING: &str = "HTTP/1.1 503 Service Unavailable\r\nX-DevModePending: true\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";
pub const HTTP_OK: &str = "HTTP/1.1 200 OK\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok";
pub const HTTP_ERROR: &str = "HTTP/1.1 500 Internal Server Error\r\ncontent-length: 0\r\nconnection: close\r\n\r\n";

/// Minimal HTTP server: the first `pending` requests get a dev-mode pending
/// response, later ones get `then`. Bare connects (port probes) are ignored.
pub async fn serve_http(pending: usize, then: &'static str) -> Result<(u16, Arc<AtomicUsize>), Box<dyn Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let requests = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&requests);

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let counter = Arc::clone(&counter);
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                    if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let seen = counter.fetch_add(1, Ordering::SeqCst);
                let response = if seen < pending { HTTP_PENDING } else { then };
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    Ok((port, requests))
}
