// src/collab/commands.rs

use std::collections::BTreeMap;

use crate::collab::{AppDescriptor, BuildCommandProvider, BuildCommands};
use crate::config::model::{AppConfig, SuiteConfig};
use crate::errors::{PitError, Result};
use crate::exec::command_line::substitute;
use crate::watch::Marker;

/// Commands taken verbatim from the suite file, with `{port}` and
/// `{version}` filled in.
#[derive(Debug, Clone)]
pub struct ConfiguredCommands {
    apps: BTreeMap<String, AppConfig>,
}

impl ConfiguredCommands {
    pub fn from_config(cfg: &SuiteConfig) -> Self {
        Self {
            apps: cfg.app.clone(),
        }
    }
}

impl BuildCommandProvider for ConfiguredCommands {
    fn commands(&self, app: &AppDescriptor) -> Result<BuildCommands> {
        let cmds = self
            .apps
            .get(&app.name)
            .and_then(|cfg| cfg.mode(app.mode))
            .ok_or_else(|| {
                PitError::ConfigError(format!(
                    "no commands configured for app '{}' in {} mode",
                    app.name, app.mode
                ))
            })?;

        Ok(BuildCommands {
            compile: substitute(&cmds.compile, app.port, &app.version),
            run: substitute(&cmds.run, app.port, &app.version),
            marker: Marker::from_config(&cmds.marker, cmds.literal_marker)?,
        })
    }
}
