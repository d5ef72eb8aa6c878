// src/report/mod.rs

//! Post-mortem reporting: error attribution and CI step summaries.

pub mod diagnose;
pub mod summary;

pub use diagnose::{likely_cause, scan_deprecations, scan_errors, ErrorFamily, Finding};
pub use summary::StepSummary;
