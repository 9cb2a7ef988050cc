//! Configuration module with business-specific sub-modules
//!
//! This module organizes configuration into logical areas:
//! - `cache` - Redis connection, pool and key namespace configuration
//! - `environment` - Environment detection and logging configuration

pub mod cache;
pub mod environment;

use config::{Config, ConfigError, File, FileFormat};
use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use cache::{CacheConfig, PoolConfig, DEFAULT_MAX_WAIT};
pub use environment::{Environment, LogFormat, LoggingConfig};

/// Prefix for layered environment overrides, e.g. `CACHEKIT__REDIS__PORT=6380`
pub const ENV_PREFIX: &str = "CACHEKIT";

/// Complete application configuration combining all sub-configurations
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Environment configuration
    pub environment: Environment,

    /// Redis configuration
    pub redis: CacheConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load layered configuration.
    ///
    /// Sources, later ones winning:
    /// 1. built-in defaults, with logging defaults for the detected environment
    /// 2. `config/default.toml` (optional)
    /// 3. `config/{environment}.toml` (optional)
    /// 4. `CACHEKIT__*` environment variables (`__` separates nesting levels)
    pub fn load() -> Result<Self, ConfigError> {
        let environment = Environment::from_env();
        let logging = LoggingConfig::for_environment(environment);

        Config::builder()
            .set_default("environment", environment.as_str())?
            .set_default("logging.level", logging.level)?
            .set_default("logging.format", logging.format.as_str())?
            .set_default("logging.ansi", logging.ansi)?
            .set_default("logging.source_location", logging.source_location)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&environment.config_name()).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Parse configuration from a TOML document; missing keys take their defaults
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    /// Load configuration from flat `REDIS_*` environment variables
    pub fn from_env() -> Self {
        let environment = Environment::from_env();
        Self {
            environment,
            redis: CacheConfig::from_env(),
            logging: LoggingConfig::for_environment(environment),
        }
    }

    /// Check every section for invalid values
    pub fn validate(&self) -> Result<(), String> {
        self.redis.validate()
    }
}
