// src/timing.rs

//! Poll intervals, grace periods and fixed sub-wait timeouts.
//!
//! Everything time-related that is not supplied per request lives here so
//! that tests can shrink the ticks to milliseconds. The defaults are the
//! values the orchestrator uses in production.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Tick of general log-marker waits.
    pub marker_poll: Duration,
    /// Tick of port and HTTP readiness attempts.
    pub readiness_poll: Duration,
    /// Sleep while the server reports that the frontend is still compiling.
    pub pending_poll: Duration,
    /// Per-request timeout of a single HTTP readiness attempt.
    pub request_timeout: Duration,
    /// How long a background process must survive to count as launched.
    pub launch_grace: Duration,
    /// How long `terminate` waits after the graceful signal.
    pub terminate_grace: Duration,
    /// Fixed timeout of the post-marker network readiness sub-wait.
    pub readiness_timeout: Duration,
    /// Timeout of the best-effort dev-mode bundle-compiled wait.
    pub bundle_timeout: Duration,
    /// Tick of the verbose tail task.
    pub tail_poll: Duration,
    /// Upper bound for the foreground compile step.
    pub compile_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            marker_poll: Duration::from_secs(4),
            readiness_poll: Duration::from_secs(1),
            pending_poll: Duration::from_secs(3),
            request_timeout: Duration::from_secs(5),
            launch_grace: Duration::from_secs(2),
            terminate_grace: Duration::from_secs(5),
            readiness_timeout: Duration::from_secs(60),
            bundle_timeout: Duration::from_secs(300),
            tail_poll: Duration::from_millis(500),
            compile_timeout: Duration::from_secs(30 * 60),
        }
    }
}

impl Timing {
    /// Millisecond-scale timing for tests.
    pub fn fast() -> Self {
        Self {
            marker_poll: Duration::from_millis(20),
            readiness_poll: Duration::from_millis(20),
            pending_poll: Duration::from_millis(20),
            request_timeout: Duration::from_millis(500),
            launch_grace: Duration::from_millis(200),
            terminate_grace: Duration::from_millis(500),
            readiness_timeout: Duration::from_millis(300),
            bundle_timeout: Duration::from_millis(200),
            tail_poll: Duration::from_millis(20),
            compile_timeout: Duration::from_secs(10),
        }
    }
}
