// src/report/diagnose.rs

//! Attribute a failure to a likely cause by scanning the sink.
//!
//! Purely informational: nothing here changes a validation result.

use std::fmt;

const MAX_ERROR_LINES: usize = 20;
const MAX_DEPRECATION_LINES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorFamily {
    BuildTool,
    DependencyResolution,
    Frontend,
    Startup,
    PortBind,
}

impl fmt::Display for ErrorFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorFamily::BuildTool => "build tool",
            ErrorFamily::DependencyResolution => "dependency resolution",
            ErrorFamily::Frontend => "frontend tooling",
            ErrorFamily::Startup => "application startup",
            ErrorFamily::PortBind => "port bind",
        };
        f.write_str(s)
    }
}

/// Lower-cased needles; more specific families come first so that a line
/// such as `[ERROR] Could not resolve dependencies` is attributed to
/// dependency resolution rather than to the generic build-tool family.
const PATTERNS: &[(ErrorFamily, &str)] = &[
    (ErrorFamily::DependencyResolution, "could not resolve dependencies"),
    (ErrorFamily::DependencyResolution, "could not find artifact"),
    (ErrorFamily::PortBind, "java.net.bindexception"),
    (ErrorFamily::PortBind, "address already in use"),
    (ErrorFamily::Frontend, "npm err!"),
    (ErrorFamily::Frontend, "vite failed to load"),
    (ErrorFamily::Frontend, "node installation failed"),
    (ErrorFamily::Startup, "error starting application"),
    (ErrorFamily::Startup, "failed to start"),
    (ErrorFamily::Startup, "java.lang.exceptionininitializererror"),
    (ErrorFamily::Startup, "java.lang.runtimeexception"),
    (ErrorFamily::BuildTool, "[error]"),
    (ErrorFamily::BuildTool, "failure"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub family: ErrorFamily,
    pub line: String,
}

/// Lines matching a known error family, case-insensitively, first
/// `MAX_ERROR_LINES` only.
pub fn scan_errors(contents: &str) -> Vec<Finding> {
    contents
        .lines()
        .filter_map(|line| {
            let lower = line.to_lowercase();
            PATTERNS
                .iter()
                .find(|(_, needle)| lower.contains(needle))
                .map(|(family, _)| Finding {
                    family: *family,
                    line: line.trim_end().to_string(),
                })
        })
        .take(MAX_ERROR_LINES)
        .collect()
}

/// The family with the most hits, if any.
pub fn likely_cause(findings: &[Finding]) -> Option<ErrorFamily> {
    let mut counts: Vec<(ErrorFamily, usize)> = Vec::new();
    for f in findings {
        match counts.iter_mut().find(|(family, _)| *family == f.family) {
            Some((_, n)) => *n += 1,
            None => counts.push((f.family, 1)),
        }
    }
    // Ties go to the family seen first.
    counts
        .into_iter()
        .fold(None, |best: Option<(ErrorFamily, usize)>, cur| match best {
            Some(b) if b.1 >= cur.1 => Some(b),
            _ => Some(cur),
        })
        .map(|(family, _)| family)
}

/// `WARNING ... deprecated` lines, first `MAX_DEPRECATION_LINES` only.
pub fn scan_deprecations(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter(|line| line.contains("WARNING") && line.to_lowercase().contains("deprecated"))
        .map(|line| line.trim_end().to_string())
        .take(MAX_DEPRECATION_LINES)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_families() {
        let log = "\
[INFO] Scanning for projects...
[ERROR] Failed to execute goal on project app: Could not resolve dependencies for project
npm ERR! code ERESOLVE
Caused by: java.net.BindException: Address already in use
[ERROR] COMPILATION ERROR
";
        let findings = scan_errors(log);
        let families: Vec<_> = findings.iter().map(|f| f.family).collect();
        assert_eq!(
            families,
            vec![
                ErrorFamily::DependencyResolution,
                ErrorFamily::Frontend,
                ErrorFamily::PortBind,
                ErrorFamily::BuildTool,
            ]
        );
        assert_eq!(likely_cause(&findings), Some(ErrorFamily::DependencyResolution));
    }

    #[test]
    fn error_scan_is_capped() {
        let log = "[ERROR] boom\n".repeat(50);
        assert_eq!(scan_errors(&log).len(), 20);
        assert_eq!(likely_cause(&scan_errors(&log)), Some(ErrorFamily::BuildTool));
        assert_eq!(likely_cause(&[]), None);
    }

    #[test]
    fn deprecations_need_both_words() {
        let log = "\
WARNING: method foo() is deprecated
WARNING: something else
INFO deprecated but not a warning
";
        assert_eq!(scan_deprecations(log), vec!["WARNING: method foo() is deprecated"]);
    }
}
