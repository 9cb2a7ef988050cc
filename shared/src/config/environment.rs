//! Environment detection and logging settings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Variables consulted, in order, to pick the environment
const ENVIRONMENT_VARS: [&str; 3] = ["CACHEKIT_ENV", "ENVIRONMENT", "RUST_ENV"];

/// Deployment environment; selects config and `.env` files and logging defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Environment named by the first set variable among `CACHEKIT_ENV`,
    /// `ENVIRONMENT` and `RUST_ENV`; development when none parses
    pub fn from_env() -> Self {
        ENVIRONMENT_VARS
            .iter()
            .find_map(|name| std::env::var(name).ok())
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }

    /// Layered configuration file for this environment, without extension
    pub fn config_name(&self) -> String {
        format!("config/{}", self.as_str())
    }

    /// Dotenv file loaded before `.env`
    pub fn env_file(&self) -> String {
        format!(".env.{}", self.as_str())
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" | "test" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

/// Tracing subscriber settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `ck_infra=debug,warn`
    pub level: String,

    pub format: LogFormat,

    /// ANSI colors in terminal output
    pub ansi: bool,

    pub timestamp: bool,

    /// Include file and line of each event
    pub source_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

impl LoggingConfig {
    /// Defaults for an environment: verbose pretty output while developing,
    /// JSON lines elsewhere
    pub fn for_environment(environment: Environment) -> Self {
        let developing = environment == Environment::Development;
        let level = match environment {
            Environment::Development => "debug",
            Environment::Staging => "info",
            Environment::Production => "warn",
        };

        Self {
            level: level.to_string(),
            format: if developing { LogFormat::Pretty } else { LogFormat::Json },
            ansi: developing,
            timestamp: true,
            source_location: developing,
        }
    }
}

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
        }
    }
}
