//! Shared configuration types for the CacheKit workspace
//!
//! This crate provides the configuration used across the workspace:
//! - Redis connection, pool and namespace settings
//! - Environment detection and logging settings
//! - Layered loading from files and environment variables

pub mod config;

// Re-export commonly used items at crate root
pub use config::{
    AppConfig, CacheConfig, Environment, LogFormat, LoggingConfig, PoolConfig,
};
