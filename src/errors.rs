// src/errors.rs

//! Crate-wide fault type.
//!
//! Expected failure modes of a validation (compile failure, launch failure,
//! readiness timeout, ...) are *not* errors; they are reported as
//! [`crate::engine::ValidationResult`] values. `PitError` is reserved for
//! conditions the orchestrator cannot reason about, such as a sink that
//! cannot be created.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::ValidationState;

#[derive(Error, Debug)]
pub enum PitError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Sink error for {path:?}: {source}")]
    SinkError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Invalid transition: event {event} is not valid in state {state:?}")]
    InvalidTransition {
        state: ValidationState,
        event: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PitError {
    pub(crate) fn sink(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PitError::SinkError {
            path: path.into(),
            source,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PitError>;
