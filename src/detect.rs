// src/detect.rs

//! Recognises the one recoverable launch failure: the framework rewrote a
//! generated config file while serving its first request.

use tracing::info;

use crate::errors::Result;
use crate::sink::Sink;

/// Line printed by the framework when it regenerates `tsconfig.json`.
pub const DEFAULT_REWRITE_MARKER: &str = "'tsconfig.json' has been updated";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRewriteDetector {
    marker: String,
}

impl Default for ConfigRewriteDetector {
    fn default() -> Self {
        Self::new(DEFAULT_REWRITE_MARKER)
    }
}

impl ConfigRewriteDetector {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    pub fn matches(&self, contents: &str) -> bool {
        contents.contains(&self.marker)
    }

    /// Scan the sink. A hit is noted in the sink as a diagnostic line.
    pub fn was_config_rewritten(&self, sink: &Sink) -> Result<bool> {
        if !self.matches(&sink.read()?) {
            return Ok(false);
        }
        info!(sink = ?sink.path(), marker = %self.marker, "generated config was rewritten");
        sink.append_diagnostic("Found tsconfig.json modified")?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_marker_and_notes_it() {
        let dir = tempfile::tempdir().unwrap();
        let sink = Sink::create(dir.path().join("app.out")).unwrap();
        let detector = ConfigRewriteDetector::default();

        sink.append_line("Started Application in 4.2 seconds").unwrap();
        assert!(!detector.was_config_rewritten(&sink).unwrap());

        sink.append_line("INFO  'tsconfig.json' has been updated.").unwrap();
        assert!(detector.was_config_rewritten(&sink).unwrap());
        assert!(sink.read().unwrap().contains(">>>> PiT: Found tsconfig.json modified"));
    }

    #[test]
    fn custom_marker() {
        let detector = ConfigRewriteDetector::new("types.d.ts regenerated");
        assert!(detector.matches("... types.d.ts regenerated ..."));
        assert!(!detector.matches("'tsconfig.json' has been updated"));
    }
}
