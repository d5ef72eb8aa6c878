// src/probe/mod.rs

//! Network readiness of the launched application.
//!
//! [`ReadinessCheck`] is the seam the orchestrator uses; [`ReadinessProbe`]
//! is the real implementation (TCP via `tokio::net`, HTTP via `reqwest`).

pub mod http;
pub mod port;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::errors::Result;
use crate::exec::BoxFuture;
use crate::timing::Timing;

pub use http::{HttpPoll, HttpWait};
pub use port::{await_port, is_listening, PortWait};

/// Decides from response headers whether the server is still compiling.
pub type PendingPredicate = Arc<dyn Fn(&HeaderMap) -> bool + Send + Sync>;

/// Asked on every error status; `true` ends the HTTP wait at once.
pub type SettleOnError<'a> = dyn Fn() -> bool + Send + Sync + 'a;

/// Never settles early: every error status is retried until the timeout.
pub fn never_settle() -> bool {
    false
}

pub const DEV_MODE_PENDING_HEADER: &str = "X-DevModePending";

/// `X-DevModePending` present with any value.
pub fn default_pending_predicate() -> PendingPredicate {
    Arc::new(|headers: &HeaderMap| headers.contains_key(DEV_MODE_PENDING_HEADER))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Port open and expected status seen. `pending_secs` is the time spent
    /// waiting on the frontend compiler.
    Ready { pending_secs: u64 },
    PortClosed,
    NotReady { last_status: Option<u16> },
    Cancelled,
}

pub trait ReadinessCheck: Send {
    /// Single connect attempt; used to refuse starting on a busy port.
    fn port_in_use(&mut self, port: u16) -> BoxFuture<'_, bool>;

    /// Port wait followed by the HTTP wait, each bounded by `timeout`.
    ///
    /// `settle_on_error` is consulted whenever the server answers with an
    /// unexpected status; if it returns `true` the wait ends with
    /// `NotReady` immediately instead of retrying.
    fn await_ready<'a>(
        &'a mut self,
        port: u16,
        timeout: Duration,
        cancel: &'a CancellationToken,
        settle_on_error: &'a SettleOnError<'a>,
    ) -> BoxFuture<'a, ProbeOutcome>;
}

pub struct ReadinessProbe {
    client: Client,
    timing: Timing,
    expected: StatusCode,
    is_pending: PendingPredicate,
}

impl ReadinessProbe {
    pub fn new(timing: Timing, is_pending: PendingPredicate) -> Result<Self> {
        let client = Client::builder()
            .timeout(timing.request_timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            timing,
            expected: StatusCode::OK,
            is_pending,
        })
    }

    pub fn with_expected_status(mut self, status: StatusCode) -> Self {
        self.expected = status;
        self
    }

    pub fn url_for(port: u16) -> String {
        format!("http://localhost:{port}/")
    }

    async fn ready(
        &self,
        port: u16,
        timeout: Duration,
        cancel: &CancellationToken,
        settle_on_error: &SettleOnError<'_>,
    ) -> ProbeOutcome {
        match await_port(port, timeout, self.timing.readiness_poll, cancel).await {
            PortWait::Open => {}
            PortWait::Closed => return ProbeOutcome::PortClosed,
            PortWait::Cancelled => return ProbeOutcome::Cancelled,
        }

        let url = Self::url_for(port);
        let poll = HttpPoll {
            client: &self.client,
            url: &url,
            expected: self.expected,
            timeout,
            poll: self.timing.readiness_poll,
            pending_poll: self.timing.pending_poll,
            is_pending: &self.is_pending,
            settle_on_error,
        };
        match poll.run(cancel).await {
            HttpWait::Ok { pending_secs } => ProbeOutcome::Ready { pending_secs },
            HttpWait::NotReady { last_status } => ProbeOutcome::NotReady { last_status },
            HttpWait::Cancelled => ProbeOutcome::Cancelled,
        }
    }
}

impl ReadinessCheck for ReadinessProbe {
    fn port_in_use(&mut self, port: u16) -> BoxFuture<'_, bool> {
        let timeout = self.timing.request_timeout;
        Box::pin(is_listening(port, timeout))
    }

    fn await_ready<'a>(
        &'a mut self,
        port: u16,
        timeout: Duration,
        cancel: &'a CancellationToken,
        settle_on_error: &'a SettleOnError<'a>,
    ) -> BoxFuture<'a, ProbeOutcome> {
        Box::pin(self.ready(port, timeout, cancel, settle_on_error))
    }
}
