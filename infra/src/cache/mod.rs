//! Cache module for Redis-based caching
//!
//! This module provides the pooled Redis command facade:
//! - `pool` - bounded bb8 connection pool and statistics
//! - `redis_utils` - one method per Redis command plus batch deletion
//! - `memory` - in-memory Redis double for tests (feature `mock-services`)

pub mod pool;
pub mod redis_utils;

#[cfg(feature = "mock-services")]
pub mod memory;

#[cfg(test)]
mod tests;

pub use pool::{PoolStatistics, RedisConnection, RedisPool, IDLE_TIMEOUT};
pub use redis_utils::RedisUtils;

#[cfg(feature = "mock-services")]
pub use memory::{MemoryConnection, MemoryConnectionManager, MemoryStore};

// Re-export commonly used types
pub use ck_core::cache::{CacheKey, KeyNamespace, KeyType};
pub use ck_shared::config::{CacheConfig, PoolConfig};
