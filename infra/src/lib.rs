//! # Infrastructure Layer
//!
//! This crate implements the infrastructure layer of CacheKit. It provides
//! a bounded Redis connection pool and a command facade that runs every
//! Redis command on a pooled connection and always hands it back.
//!
//! ## Architecture
//!
//! The infrastructure layer contains:
//! - **Cache**: connection pool, command facade, batch pattern deletion
//! - **Errors**: a single error type for pool and command failures
//! - **Telemetry**: tracing subscriber setup
//!
//! ## Features
//!
//! - `mock-services`: in-memory Redis double for tests (default)

/// Cache module - Redis pool and command facade
pub mod cache;

/// Error types
pub mod errors;

/// Tracing setup
pub mod telemetry;

pub use cache::{PoolStatistics, RedisPool, RedisUtils};
pub use errors::{RemoteStoreError, Result};

use ck_shared::config::{AppConfig, Environment};

/// Initialize the command facade from configuration
///
/// This function:
/// - loads `.env.{environment}` and `.env` files if present
/// - loads layered configuration (`config/*.toml`, `CACHEKIT__*` variables)
/// - installs the tracing subscriber
/// - builds the Redis pool and facade
///
/// Must be called from within a Tokio runtime.
pub fn initialize() -> Result<RedisUtils> {
    // variables already set win over both files, the environment file over `.env`
    dotenvy::from_filename(Environment::from_env().env_file()).ok();
    dotenvy::dotenv().ok();

    let config = AppConfig::load().map_err(|e| RemoteStoreError::Config(e.to_string()))?;
    telemetry::init_tracing(&config.logging);

    initialize_with(&config)
}

/// Initialize the command facade from a given configuration
pub fn initialize_with(config: &AppConfig) -> Result<RedisUtils> {
    tracing::info!(
        "Initializing Redis facade for {} environment...",
        config.environment
    );

    config.validate().map_err(RemoteStoreError::Config)?;
    let utils = RedisUtils::from_config(&config.redis)?;

    tracing::info!(
        "Redis facade initialized with namespace '{}'",
        utils.namespace()
    );
    Ok(utils)
}
