// src/exec/command_line.rs

//! Small rewrites applied to command lines before they are run.

use std::sync::LazyLock;

use regex::Regex;

static BUILD_TOOL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(^|[\s/])(mvnw?|gradlew?)(\s|$)").ok());

/// Append `--offline` to Maven/Gradle invocations that are not already
/// offline. Other commands are returned unchanged.
pub fn with_offline_flag(command: &str) -> String {
    let invokes_build_tool = BUILD_TOOL
        .as_ref()
        .is_some_and(|re| re.is_match(command));
    let already_offline = command
        .split_whitespace()
        .any(|arg| arg == "--offline" || arg == "-o");

    if invokes_build_tool && !already_offline {
        format!("{} --offline", command.trim_end())
    } else {
        command.to_string()
    }
}

/// Replace `{port}` and `{version}` placeholders.
pub fn substitute(command: &str, port: u16, version: &str) -> String {
    command
        .replace("{port}", &port.to_string())
        .replace("{version}", version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_flag_only_for_build_tools() {
        assert_eq!(
            with_offline_flag("mvn -ntp -B package"),
            "mvn -ntp -B package --offline"
        );
        assert_eq!(
            with_offline_flag("./gradlew bootRun"),
            "./gradlew bootRun --offline"
        );
        assert_eq!(with_offline_flag("npm run dev"), "npm run dev");
        assert_eq!(with_offline_flag("mvn -o package"), "mvn -o package");
        assert_eq!(with_offline_flag("mvnd package"), "mvnd package");
    }

    #[test]
    fn placeholders_are_substituted() {
        assert_eq!(
            substitute("mvn -Dvaadin.version={version} -Dserver.port={port}", 8080, "24.8.0"),
            "mvn -Dvaadin.version=24.8.0 -Dserver.port=8080"
        );
    }
}
