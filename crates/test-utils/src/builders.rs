#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pit_runner::config::{AppConfig, ControlPlaneSection, ModeCommands, RawSuiteConfig, SuiteConfig, SuiteSection};
use pit_runner::engine::{ValidationFlags, ValidationRequest};
use pit_runner::types::Mode;
use pit_runner::watch::Marker;

/// Builder for `ValidationRequest` with test-friendly defaults.
pub struct RequestBuilder {
    req: ValidationRequest,
}

impl RequestBuilder {
    /// Prod-mode request for `app`, sink under `out_dir`.
    pub fn new(app: &str, out_dir: &Path) -> Self {
        Self {
            req: ValidationRequest {
                app: app.to_string(),
                mode: Mode::Prod,
                version: "24.8.0".to_string(),
                port: 8080,
                compile: "mvn -ntp -B package".to_string(),
                run: "java -jar target/app.jar".to_string(),
                marker: Marker::regex(r"Started \w+ in").expect("valid regex"),
                test_file: None,
                timeout: Duration::from_millis(300),
                work_dir: None,
                out_dir: out_dir.to_path_buf(),
                flags: ValidationFlags::default(),
            },
        }
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.req.mode = mode;
        self
    }

    pub fn compile(mut self, cmd: &str) -> Self {
        self.req.compile = cmd.to_string();
        self
    }

    pub fn run(mut self, cmd: &str) -> Self {
        self.req.run = cmd.to_string();
        self
    }

    pub fn marker(mut self, marker: Marker) -> Self {
        self.req.marker = marker;
        self
    }

    pub fn test_file(mut self, path: &str) -> Self {
        self.req.test_file = Some(PathBuf::from(path));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.req.timeout = timeout;
        self
    }

    pub fn work_dir(mut self, dir: &Path) -> Self {
        self.req.work_dir = Some(dir.to_path_buf());
        self
    }

    pub fn flags(mut self, flags: ValidationFlags) -> Self {
        self.req.flags = flags;
        self
    }

    pub fn dry_run(mut self) -> Self {
        self.req.flags.dry_run = true;
        self
    }

    pub fn build(self) -> ValidationRequest {
        self.req
    }
}

/// Builder for `SuiteConfig`.
pub struct SuiteConfigBuilder {
    config: RawSuiteConfig,
}

impl SuiteConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawSuiteConfig {
                suite: SuiteSection::default(),
                control_plane: None,
                app: BTreeMap::new(),
            },
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.config.suite.version = version.to_string();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.suite.port = port;
        self
    }

    pub fn out_dir(mut self, dir: &Path) -> Self {
        self.config.suite.out_dir = Some(dir.to_path_buf());
        self
    }

    pub fn unsupported(mut self, app: &str) -> Self {
        self.config.suite.unsupported.push(app.to_string());
        self
    }

    pub fn control_plane(mut self, install: &str, uninstall: &str) -> Self {
        self.config.control_plane = Some(ControlPlaneSection {
            install: install.to_string(),
            uninstall: Some(uninstall.to_string()),
        });
        self
    }

    pub fn with_app(mut self, name: &str, app: AppConfig) -> Self {
        self.config.app.insert(name.to_string(), app);
        self
    }

    pub fn raw(self) -> RawSuiteConfig {
        self.config
    }

    pub fn build(self) -> SuiteConfig {
        SuiteConfig::try_from(self.config).expect("Failed to build valid suite from builder")
    }
}

impl Default for SuiteConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `ModeCommands` with the given commands and a regex marker.
pub fn mode_commands(compile: &str, run: &str, marker: &str) -> ModeCommands {
    ModeCommands {
        compile: compile.to_string(),
        run: run.to_string(),
        marker: marker.to_string(),
        literal_marker: false,
        test_file: None,
    }
}

/// An app that only has a prod mode.
pub fn prod_app(compile: &str, run: &str, marker: &str) -> AppConfig {
    AppConfig {
        prod: Some(mode_commands(compile, run, marker)),
        ..Default::default()
    }
}
