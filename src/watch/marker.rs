// src/watch/marker.rs

use std::fmt;

use anyhow::{Context, Result};
use regex::Regex;

/// A readiness marker expected to show up in a sink.
///
/// Launch markers are usually regexes (`"Started .* in \d+"`), but some
/// framework messages contain regex metacharacters and are easier to express
/// literally (`"'tsconfig.json' has been updated"`).
#[derive(Clone)]
pub enum Marker {
    Literal(String),
    Regex(Regex),
}

impl Marker {
    pub fn literal(text: impl Into<String>) -> Self {
        Marker::Literal(text.into())
    }

    pub fn regex(pattern: &str) -> Result<Self> {
        let re = Regex::new(pattern)
            .with_context(|| format!("compiling marker regex '{pattern}'"))?;
        Ok(Marker::Regex(re))
    }

    /// Build from configuration: `literal = true` takes `text` verbatim.
    pub fn from_config(text: &str, literal: bool) -> Result<Self> {
        if literal {
            Ok(Self::literal(text))
        } else {
            Self::regex(text)
        }
    }

    /// The pattern as written, used in log and sink messages.
    pub fn as_str(&self) -> &str {
        match self {
            Marker::Literal(s) => s,
            Marker::Regex(re) => re.as_str(),
        }
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        match self {
            Marker::Literal(s) => haystack.contains(s.as_str()),
            Marker::Regex(re) => re.is_match(haystack),
        }
    }
}

impl fmt::Debug for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Literal(s) => f.debug_tuple("Literal").field(s).finish(),
            Marker::Regex(re) => f.debug_tuple("Regex").field(&re.as_str()).finish(),
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Marker::Literal(a), Marker::Literal(b)) => a == b,
            (Marker::Regex(a), Marker::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_marker_ignores_regex_metacharacters() {
        let m = Marker::literal("'tsconfig.json' has been updated");
        assert!(m.is_match("INFO 'tsconfig.json' has been updated."));
        assert!(!m.is_match("INFO 'tsconfigxjson' has been updated."));
    }

    #[test]
    fn regex_marker_matches_across_lines() {
        let m = Marker::regex(r"Started \w+ in \d+").unwrap();
        assert!(m.is_match("boot\nStarted Application in 12.3 seconds\n"));
        assert!(!m.is_match("Starting Application"));
    }

    #[test]
    fn invalid_regex_is_reported() {
        let err = Marker::regex("Started (").unwrap_err();
        assert!(err.to_string().contains("Started ("));
    }
}
