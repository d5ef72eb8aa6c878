// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{RawSuiteConfig, SuiteConfig};
use crate::errors::Result;

/// Load a suite file from a given path and return the raw `RawSuiteConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawSuiteConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawSuiteConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a suite file and validate it.
///
/// Checks for:
/// - at least one app, each with at least one mode,
/// - non-empty commands and compilable markers,
/// - non-zero port, timeouts and attempt cap.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<SuiteConfig> {
    let raw_config = load_from_path(&path)?;
    let config = SuiteConfig::try_from(raw_config)?;
    Ok(config)
}

/// `pit.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("pit.toml")
}
