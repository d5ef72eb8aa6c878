// src/probe/http.rs

//! HTTP readiness polling.
//!
//! Every attempt is a `GET` with `Accept: text/html`. Transport errors mean
//! "not up yet" and are retried. A response whose headers satisfy the
//! pending predicate means the server is still compiling its frontend: the
//! probe sleeps and retries without charging that time to the timeout.
//!
//! An error status is normally retried until the timeout. When the caller's
//! `settle_on_error` check says the error is already explained (the generated
//! config was rewritten), the poll stops at that first error.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap};
use reqwest::{Client, StatusCode};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::probe::{PendingPredicate, SettleOnError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpWait {
    Ok { pending_secs: u64 },
    NotReady { last_status: Option<u16> },
    Cancelled,
}

pub struct HttpPoll<'a> {
    pub client: &'a Client,
    pub url: &'a str,
    pub expected: StatusCode,
    pub timeout: Duration,
    pub poll: Duration,
    pub pending_poll: Duration,
    pub is_pending: &'a PendingPredicate,
    pub settle_on_error: &'a SettleOnError<'a>,
}

impl HttpPoll<'_> {
    pub async fn run(&self, cancel: &CancellationToken) -> HttpWait {
        info!(url = %self.url, timeout_secs = self.timeout.as_secs(), "waiting for HTTP readiness");

        let start = Instant::now();
        let mut pending = Duration::ZERO;
        let mut last_status = None;

        loop {
            if cancel.is_cancelled() {
                return HttpWait::Cancelled;
            }

            let pause = match self.attempt().await {
                Attempt::Ready => {
                    info!(
                        url = %self.url,
                        pending_secs = pending.as_secs(),
                        "server returned expected status"
                    );
                    return HttpWait::Ok {
                        pending_secs: pending.as_secs(),
                    };
                }
                Attempt::Pending => {
                    debug!(url = %self.url, "frontend still compiling");
                    pending += self.pending_poll;
                    self.pending_poll
                }
                Attempt::Status(status) => {
                    debug!(url = %self.url, status = status.as_u16(), "unexpected status");
                    last_status = Some(status.as_u16());
                    if (self.settle_on_error)() {
                        info!(url = %self.url, status = status.as_u16(), "error explained by caller; not retrying");
                        return HttpWait::NotReady { last_status };
                    }
                    self.poll
                }
                Attempt::Transport => self.poll,
            };

            // Pending time is not part of the budget.
            let active = start.elapsed().saturating_sub(pending);
            if active >= self.timeout {
                warn!(url = %self.url, ?last_status, "server not ready before timeout");
                return HttpWait::NotReady { last_status };
            }

            tokio::select! {
                _ = sleep(pause) => {}
                _ = cancel.cancelled() => {}
            }
        }
    }

    async fn attempt(&self) -> Attempt {
        let resp = match self
            .client
            .get(self.url)
            .header(ACCEPT, "text/html")
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                if !e.is_connect() {
                    debug!(url = %self.url, error = %e, "readiness request failed");
                }
                return Attempt::Transport;
            }
        };
        classify(resp.status(), resp.headers(), self.expected, self.is_pending)
    }
}

enum Attempt {
    Ready,
    Pending,
    Status(StatusCode),
    Transport,
}

fn classify(
    status: StatusCode,
    headers: &HeaderMap,
    expected: StatusCode,
    is_pending: &PendingPredicate,
) -> Attempt {
    if is_pending(headers) {
        Attempt::Pending
    } else if status == expected {
        Attempt::Ready
    } else {
        Attempt::Status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::default_pending_predicate;
    use reqwest::header::HeaderValue;

    #[test]
    fn pending_header_wins_over_status() {
        let pred = default_pending_predicate();
        let mut headers = HeaderMap::new();
        headers.insert("X-DevModePending", HeaderValue::from_static("true"));

        assert!(matches!(
            classify(StatusCode::OK, &headers, StatusCode::OK, &pred),
            Attempt::Pending
        ));
        assert!(matches!(
            classify(StatusCode::SERVICE_UNAVAILABLE, &headers, StatusCode::OK, &pred),
            Attempt::Pending
        ));
        assert!(matches!(
            classify(StatusCode::INTERNAL_SERVER_ERROR, &HeaderMap::new(), StatusCode::OK, &pred),
            Attempt::Status(StatusCode::INTERNAL_SERVER_ERROR)
        ));
    }
}
