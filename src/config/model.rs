// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::types::Mode;

/// Suite file as read from TOML, before validation.
///
/// ```toml
/// [suite]
/// version = "24.8.0"
/// port = 8080
///
/// [app.hello]
/// test_file = "tests/hello.spec.ts"
///
/// [app.hello.dev]
/// compile = "mvn -ntp -B clean"
/// run = "mvn -ntp -B spring-boot:run -Dvaadin.version={version}"
/// marker = "Started .* in \\d+"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct RawSuiteConfig {
    #[serde(default)]
    pub suite: SuiteSection,

    #[serde(default)]
    pub control_plane: Option<ControlPlaneSection>,

    /// Keys are application names.
    #[serde(default)]
    pub app: BTreeMap<String, AppConfig>,
}

/// Validated suite file. Only constructed through `TryFrom<RawSuiteConfig>`.
#[derive(Debug, Clone)]
pub struct SuiteConfig {
    pub suite: SuiteSection,
    pub control_plane: Option<ControlPlaneSection>,
    pub app: BTreeMap<String, AppConfig>,
}

impl SuiteConfig {
    pub(crate) fn new_unchecked(
        suite: SuiteSection,
        control_plane: Option<ControlPlaneSection>,
        app: BTreeMap<String, AppConfig>,
    ) -> Self {
        Self {
            suite,
            control_plane,
            app,
        }
    }

    pub fn is_unsupported(&self, app: &str) -> bool {
        self.suite.unsupported.iter().any(|name| name == app)
    }
}

/// `[suite]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct SuiteSection {
    /// Version label substituted for `{version}` and used in sink names.
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Marker timeout in seconds, unless an app overrides it.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Launch attempts allowed when the generated config gets rewritten.
    #[serde(default = "default_max_launch_attempts")]
    pub max_launch_attempts: u32,

    /// Apps that are listed but known not to run in this environment.
    #[serde(default = "default_unsupported")]
    pub unsupported: Vec<String>,

    /// Where sinks are written. Relative paths resolve against the suite
    /// file's directory.
    #[serde(default)]
    pub out_dir: Option<PathBuf>,
}

fn default_version() -> String {
    "current".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    300
}

fn default_max_launch_attempts() -> u32 {
    3
}

fn default_unsupported() -> Vec<String> {
    vec![
        "vaadin-flow-karaf-example".to_string(),
        "base-starter-flow-osgi".to_string(),
    ]
}

impl Default for SuiteSection {
    fn default() -> Self {
        Self {
            version: default_version(),
            port: default_port(),
            timeout: default_timeout(),
            max_launch_attempts: default_max_launch_attempts(),
            unsupported: default_unsupported(),
            out_dir: None,
        }
    }
}

/// `[control_plane]` section: shell commands run around apps that need it.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ControlPlaneSection {
    pub install: String,
    #[serde(default)]
    pub uninstall: Option<String>,
}

/// `[app.<name>]` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Working directory, relative to the suite file.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default)]
    pub test_file: Option<PathBuf>,

    /// Per-app marker timeout in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Install the control plane before validating and remove it after.
    #[serde(default)]
    pub control_plane: bool,

    #[serde(default)]
    pub dev: Option<ModeCommands>,

    #[serde(default)]
    pub prod: Option<ModeCommands>,
}

impl AppConfig {
    pub fn mode(&self, mode: Mode) -> Option<&ModeCommands> {
        match mode {
            Mode::Dev => self.dev.as_ref(),
            Mode::Prod => self.prod.as_ref(),
        }
    }

    /// Modes configured for this app, dev first.
    pub fn modes(&self) -> impl Iterator<Item = Mode> + '_ {
        [Mode::Dev, Mode::Prod]
            .into_iter()
            .filter(|m| self.mode(*m).is_some())
    }
}

/// `[app.<name>.dev]` / `[app.<name>.prod]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModeCommands {
    pub compile: String,
    pub run: String,
    pub marker: String,

    /// Treat `marker` as a plain substring instead of a regex.
    #[serde(default)]
    pub literal_marker: bool,

    #[serde(default)]
    pub test_file: Option<PathBuf>,
}
