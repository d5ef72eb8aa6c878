// src/collab/playwright.rs

//! Browser tests via the Playwright test runner (`npx playwright test`).

use std::time::Duration;

use tracing::info;

use crate::collab::{BrowserTestRun, BrowserTestRunner};
use crate::errors::Result;
use crate::exec::{BoxFuture, CommandRunner, CommandSpec, ProcessBackend};
use crate::types::Mode;

/// Dev mode compiles the frontend on first access, so it gets longer.
pub fn test_timeout(mode: Mode) -> Duration {
    match mode {
        Mode::Prod => Duration::from_secs(300),
        Mode::Dev => Duration::from_secs(600),
    }
}

pub struct PlaywrightRunner {
    runner: CommandRunner,
}

impl PlaywrightRunner {
    pub fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }

    pub fn command_line(run: &BrowserTestRun) -> String {
        let mut cmd = format!(
            "npx playwright test {} --reporter=list --output-dir=./test-results-{}-{} --max-failures=1",
            run.test_file.display(),
            run.app,
            run.mode
        );
        if run.headed {
            cmd.push_str(" --headed");
        }
        cmd
    }

    fn spec_for(run: &BrowserTestRun) -> CommandSpec {
        CommandSpec {
            label: format!("{}-{}-playwright", run.app, run.mode),
            command: Self::command_line(run),
            sink: run.sink.clone(),
            work_dir: run.work_dir.clone(),
            env: vec![
                ("BASE_URL".to_string(), run.base_url.clone()),
                ("PIT_MODE".to_string(), run.mode.to_string()),
                ("PIT_APP".to_string(), run.app.clone()),
                ("PIT_VERSION".to_string(), run.version.clone()),
                ("PIT_OUTPUT_FILE".to_string(), run.sink.display().to_string()),
            ],
            timeout: test_timeout(run.mode),
            verbose: run.verbose,
            dry_run: false,
        }
    }
}

impl BrowserTestRunner for PlaywrightRunner {
    fn run<'a>(&'a mut self, run: &'a BrowserTestRun) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let spec = Self::spec_for(run);
            info!(app = %run.app, mode = %run.mode, test_file = ?run.test_file, "running browser tests");
            let code = self.runner.run_foreground(&spec).await?;
            Ok(code == 0)
        })
    }
}
