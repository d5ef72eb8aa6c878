// src/config/mod.rs

//! Suite file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a suite file from disk (`loader.rs`).
//! - Validate it (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    AppConfig, ControlPlaneSection, ModeCommands, RawSuiteConfig, SuiteConfig, SuiteSection,
};
pub use validate::validate_suite_config;
