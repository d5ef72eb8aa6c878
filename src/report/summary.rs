// src/report/summary.rs

//! Failure reports appended to a CI step summary (`GITHUB_STEP_SUMMARY`).

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::sink::Sink;

const MAX_REPORT_LINES: usize = 300;

/// Stack frames and framework noise that drown the interesting lines.
fn is_noise(line: &str) -> bool {
    line.trim_start().starts_with("at ") || line.contains("org.atmosphere.cpr.AtmosphereFramework")
}

/// Last `MAX_REPORT_LINES` lines of `contents` with noise removed.
pub fn report_body(contents: &str) -> String {
    let lines: Vec<&str> = contents.lines().filter(|l| !is_noise(l)).collect();
    let start = lines.len().saturating_sub(MAX_REPORT_LINES);
    lines[start..].join("\n")
}

#[derive(Debug, Clone, Default)]
pub struct StepSummary {
    path: Option<PathBuf>,
}

impl StepSummary {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append a collapsible block. Write failures are logged, not returned.
    pub fn report(&self, header: &str, body: &str) {
        warn!(header, "reporting error");
        let Some(path) = &self.path else {
            return;
        };
        if body.is_empty() {
            return;
        }
        let block = format!(
            "<details>\n<summary><h4>{header}</h4></summary>\n<pre>\n{body}\n</pre>\n</details>\n"
        );
        let res = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut f| f.write_all(block.as_bytes()));
        if let Err(e) = res {
            warn!(path = ?path, error = %e, "failed to write step summary");
        }
    }

    /// Report the tail of a sink.
    pub fn report_sink(&self, sink: &Sink, header: &str) {
        match sink.read() {
            Ok(contents) => self.report(header, &report_body(&contents)),
            Err(e) => warn!(sink = ?sink.path(), error = %e, "cannot read sink for report"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn body_drops_stack_frames_and_keeps_tail() {
        let mut log = String::new();
        for i in 0..400 {
            log.push_str(&format!("line {i}\n"));
        }
        log.push_str("java.lang.RuntimeException: boom\n\tat com.example.Main.run(Main.java:10)\n");

        let body = report_body(&log);
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 300);
        assert_eq!(lines.last(), Some(&"java.lang.RuntimeException: boom"));
        assert!(!body.contains("Main.java"));
    }

    #[test]
    fn writes_details_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.md");
        let summary = StepSummary::new(Some(path.clone()));

        summary.report("Compilation Failed", "[ERROR] boom");
        summary.report("Ignored", "");

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("<details>\n<summary><h4>Compilation Failed</h4></summary>"));
        assert!(written.contains("<pre>\n[ERROR] boom\n</pre>"));
        assert!(!written.contains("Ignored"));
    }
}
