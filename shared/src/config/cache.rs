//! Cache configuration module
//!
//! Connection and pool settings for the Redis server backing the cache,
//! plus the namespace every cache key is prefixed with.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Acquire timeout applied when `max_wait_ms` is negative
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(10);

/// Characters a namespace may not contain, since they would change key patterns
const GLOB_META: &[char] = &['*', '?', '[', ']', '\\'];

/// Redis cache configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Redis server host
    pub host: String,

    /// Redis server port
    pub port: u16,

    /// Redis database number (0-15)
    pub database: u8,

    /// ACL username (Redis 6+)
    pub username: Option<String>,

    /// Redis server password
    pub password: Option<String>,

    /// Project namespace prefixed to every cache key
    pub namespace: String,

    /// Connection pool settings
    pub pool: PoolConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 6379,
            database: 0,
            username: None,
            password: None,
            namespace: String::from("APP"),
            pool: PoolConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            host: std::env::var("REDIS_HOST").unwrap_or(defaults.host),
            port: env_parse("REDIS_PORT", defaults.port),
            database: env_parse("REDIS_DATABASE", defaults.database).min(15),
            username: env_non_empty("REDIS_USERNAME"),
            password: env_non_empty("REDIS_PASSWORD"),
            namespace: std::env::var("REDIS_NAMESPACE").unwrap_or(defaults.namespace),
            pool: PoolConfig::from_env(),
        }
    }

    /// Create a new cache configuration for a host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the key namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Set the database number
    pub fn with_database(mut self, db: u8) -> Self {
        self.database = db.min(15);
        self
    }

    /// Set the server password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the pool settings
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Build a `redis://` URL from the connection settings.
    ///
    /// Credentials are inserted verbatim; mask the result before logging it.
    pub fn connection_url(&self) -> String {
        let auth = match (&self.username, &self.password) {
            (Some(user), Some(pass)) => format!("{}:{}@", user, pass),
            (None, Some(pass)) => format!(":{}@", pass),
            (Some(user), None) => format!("{}@", user),
            (None, None) => String::new(),
        };
        format!("redis://{}{}:{}/{}", auth, self.host, self.port, self.database)
    }

    /// Connection URL with credentials replaced by `****`, safe for logs
    pub fn masked_url(&self) -> String {
        let url = self.connection_url();
        match (url.find("://"), url.find('@')) {
            (Some(proto_end), Some(at_pos)) => {
                format!("{}****{}", &url[..proto_end + 3], &url[at_pos..])
            }
            _ => url,
        }
    }

    /// Check the settings for values the pool cannot work with
    pub fn validate(&self) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err("Redis host must not be empty".to_string());
        }
        if self.port == 0 {
            return Err("Redis port must be greater than zero".to_string());
        }
        if self.database > 15 {
            return Err(format!("Redis database {} is out of range 0-15", self.database));
        }
        if self.namespace.is_empty()
            || self.namespace.contains("::")
            || self.namespace.contains(GLOB_META)
        {
            return Err(format!("Invalid key namespace: '{}'", self.namespace));
        }
        self.pool.validate()
    }
}

/// Connection pool settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of connections handed out at once
    pub max_active: u32,

    /// Maximum time to wait for a connection in milliseconds
    /// (negative: use `DEFAULT_MAX_WAIT`)
    pub max_wait_ms: i64,

    /// Maximum number of idle connections
    pub max_idle: u32,

    /// Minimum number of idle connections kept open
    pub min_idle: u32,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_active: 8,
            max_wait_ms: -1,
            max_idle: 8,
            min_idle: 0,
        }
    }
}

impl PoolConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_active: env_parse("REDIS_POOL_MAX_ACTIVE", defaults.max_active),
            max_wait_ms: env_parse("REDIS_POOL_MAX_WAIT_MS", defaults.max_wait_ms),
            max_idle: env_parse("REDIS_POOL_MAX_IDLE", defaults.max_idle),
            min_idle: env_parse("REDIS_POOL_MIN_IDLE", defaults.min_idle),
        }
    }

    /// Create pool settings with the given size and wait
    pub fn new(max_active: u32, max_wait: Duration) -> Self {
        Self {
            max_active,
            max_wait_ms: max_wait.as_millis().min(i64::MAX as u128) as i64,
            max_idle: max_active,
            min_idle: 0,
        }
    }

    /// Set the idle bounds
    pub fn with_idle(mut self, min_idle: u32, max_idle: u32) -> Self {
        self.min_idle = min_idle;
        self.max_idle = max_idle;
        self
    }

    /// Acquire timeout as a `Duration`
    pub fn max_wait(&self) -> Duration {
        if self.max_wait_ms < 0 {
            DEFAULT_MAX_WAIT
        } else {
            Duration::from_millis(self.max_wait_ms as u64)
        }
    }

    /// Check the pool bounds
    pub fn validate(&self) -> Result<(), String> {
        if self.max_active == 0 {
            return Err("Pool max_active must be greater than zero".to_string());
        }
        if self.max_wait_ms == 0 {
            return Err("Pool max_wait_ms must be non-zero (negative for the default)".to_string());
        }
        if self.max_idle > self.max_active {
            return Err(format!(
                "Pool max_idle ({}) must not exceed max_active ({})",
                self.max_idle, self.max_active
            ));
        }
        if self.min_idle > self.max_idle {
            return Err(format!(
                "Pool min_idle ({}) must not exceed max_idle ({})",
                self.min_idle, self.max_idle
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}
