// src/config/validate.rs

use crate::config::model::{RawSuiteConfig, SuiteConfig};
use crate::errors::{PitError, Result};
use crate::types::Mode;
use crate::watch::Marker;

impl TryFrom<RawSuiteConfig> for SuiteConfig {
    type Error = PitError;

    fn try_from(raw: RawSuiteConfig) -> std::result::Result<Self, Self::Error> {
        validate_suite_config(&raw)?;
        Ok(SuiteConfig::new_unchecked(raw.suite, raw.control_plane, raw.app))
    }
}

pub fn validate_suite_config(cfg: &RawSuiteConfig) -> Result<()> {
    ensure_has_apps(cfg)?;
    validate_suite_section(cfg)?;
    validate_apps(cfg)?;
    Ok(())
}

fn ensure_has_apps(cfg: &RawSuiteConfig) -> Result<()> {
    if cfg.app.is_empty() {
        return Err(PitError::ConfigError(
            "suite must contain at least one [app.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_suite_section(cfg: &RawSuiteConfig) -> Result<()> {
    let suite = &cfg.suite;
    if suite.port == 0 {
        return Err(PitError::ConfigError("[suite].port must be >= 1 (got 0)".to_string()));
    }
    if suite.timeout == 0 {
        return Err(PitError::ConfigError(
            "[suite].timeout must be >= 1 (got 0)".to_string(),
        ));
    }
    if suite.max_launch_attempts == 0 {
        return Err(PitError::ConfigError(
            "[suite].max_launch_attempts must be >= 1 (got 0)".to_string(),
        ));
    }
    if suite.version.trim().is_empty() {
        return Err(PitError::ConfigError("[suite].version must not be empty".to_string()));
    }
    Ok(())
}

fn validate_apps(cfg: &RawSuiteConfig) -> Result<()> {
    for (name, app) in cfg.app.iter() {
        if app.dev.is_none() && app.prod.is_none() {
            return Err(PitError::ConfigError(format!(
                "app '{name}' must define at least one of [app.{name}.dev] or [app.{name}.prod]"
            )));
        }
        if app.timeout == Some(0) {
            return Err(PitError::ConfigError(format!(
                "app '{name}': timeout must be >= 1 (got 0)"
            )));
        }
        if app.control_plane && cfg.control_plane.is_none() {
            return Err(PitError::ConfigError(format!(
                "app '{name}' sets control_plane = true but there is no [control_plane] section"
            )));
        }

        for mode in [Mode::Dev, Mode::Prod] {
            let Some(cmds) = app.mode(mode) else {
                continue;
            };
            for (field, value) in [
                ("compile", &cmds.compile),
                ("run", &cmds.run),
                ("marker", &cmds.marker),
            ] {
                if value.trim().is_empty() {
                    return Err(PitError::ConfigError(format!(
                        "app '{name}' [{mode}]: `{field}` must not be empty"
                    )));
                }
            }
            Marker::from_config(&cmds.marker, cmds.literal_marker).map_err(|e| {
                PitError::ConfigError(format!("app '{name}' [{mode}]: {e:#}"))
            })?;
        }
    }
    Ok(())
}
