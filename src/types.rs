// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Build mode an application is validated in.
///
/// - `Dev`: the framework's development server; frontend is compiled on the
///   fly and the bundle-compiled wait applies.
/// - `Prod`: a production build; deprecated-API usage is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Dev,
    Prod,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Dev => "dev",
            Mode::Prod => "prod",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dev" => Ok(Mode::Dev),
            "prod" => Ok(Mode::Prod),
            other => Err(format!(
                "invalid mode: {other} (expected \"dev\" or \"prod\")"
            )),
        }
    }
}

/// Label of the host platform used in sink file names.
pub fn platform_label() -> &'static str {
    std::env::consts::OS
}
