// src/watch/mod.rs

//! Sink watching.
//!
//! The launched application writes into its sink independently of us; this
//! module turns "has it printed X yet" into a bounded, interruptible poll.
//! The producer is checked for liveness on every tick, which is why polling
//! is used here rather than a blocking wait on the process.

pub mod file_watcher;
pub mod marker;

pub use file_watcher::{await_pattern, WaitOutcome};
pub use marker::Marker;
