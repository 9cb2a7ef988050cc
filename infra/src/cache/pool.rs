//! Redis connection pool management
//!
//! This module builds a bounded bb8 pool of Redis connections from the
//! shared cache configuration. Connections are handed out as RAII guards
//! that return to the pool when dropped, on every exit path.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bb8::{ErrorSink, ManageConnection, Pool, PooledConnection, RunError};
use bb8_redis::RedisConnectionManager;
use redis::{
    aio::ConnectionLike, ConnectionAddr, ConnectionInfo, ErrorKind, RedisConnectionInfo,
    RedisError,
};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use ck_shared::config::{CacheConfig, PoolConfig};

use crate::errors::{RemoteStoreError, Result};

/// Idle connections above `min_idle` are closed after this long
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// A pooled connection; returned to the pool when dropped
pub type RedisConnection<'a, M = RedisConnectionManager> = PooledConnection<'a, BoundedManager<M>>;

/// Bounded pool of Redis connections
///
/// Size bounds and wait timeout are fixed at construction. The pool is
/// cheap to clone; clones share the same connections.
pub struct RedisPool<M = RedisConnectionManager>
where
    M: ManageConnection<Error = RedisError>,
{
    /// bb8 connection pool
    pool: Arc<Pool<BoundedManager<M>>>,
    /// Connect failures seen by the manager, for waiting callers
    connect_failures: Arc<ConnectFailures>,
    /// Settings used to create this pool
    config: PoolConfig,
}

impl<M: ManageConnection<Error = RedisError>> Clone for RedisPool<M> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            connect_failures: Arc::clone(&self.connect_failures),
            config: self.config.clone(),
        }
    }
}

impl<M: ManageConnection<Error = RedisError>> fmt::Debug for RedisPool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisPool")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedisPool<RedisConnectionManager> {
    /// Create a pool against the Redis server described by `config`
    ///
    /// Connections are opened lazily (and `min_idle` of them in the
    /// background), so an unreachable server surfaces on first use.
    ///
    /// # Example
    /// ```no_run
    /// use ck_infra::cache::RedisPool;
    /// use ck_shared::config::CacheConfig;
    ///
    /// # async fn create_pool() -> ck_infra::Result<()> {
    /// let pool = RedisPool::new(&CacheConfig::new("localhost", 6379))?;
    /// assert!(pool.health_check().await?);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(config: &CacheConfig) -> Result<Self> {
        config.validate().map_err(RemoteStoreError::Config)?;

        info!(
            "Creating Redis connection pool for {} with max_active: {}",
            config.masked_url(),
            config.pool.max_active
        );

        let manager = RedisConnectionManager::new(connection_info(config)).map_err(|e| {
            error!("Invalid Redis connection settings: {}", e);
            RemoteStoreError::Config(format!("Invalid Redis connection settings: {}", e))
        })?;

        Self::with_manager(manager, &config.pool)
    }
}

impl<M> RedisPool<M>
where
    M: ManageConnection<Error = RedisError>,
{
    /// Create a pool over any connection manager
    ///
    /// A connection that fails to open is not retried: callers waiting for
    /// it fail with `Connection` right away. Must be called from within a
    /// Tokio runtime.
    pub fn with_manager(manager: M, config: &PoolConfig) -> Result<Self> {
        config.validate().map_err(RemoteStoreError::Config)?;

        let min_idle = (config.min_idle > 0).then_some(config.min_idle);
        let connect_failures = Arc::new(ConnectFailures::default());

        let builder = Pool::<BoundedManager<M>>::builder()
            .max_size(config.max_active)
            .min_idle(min_idle)
            .connection_timeout(config.max_wait())
            .idle_timeout(Some(IDLE_TIMEOUT))
            .retry_connection(false)
            .error_sink(Box::new(TracingErrorSink));

        let pool = Arc::new_cyclic(|pool| {
            builder.build_unchecked(BoundedManager {
                inner: manager,
                max_idle: config.max_idle,
                pool: pool.clone(),
                connect_failures: Arc::clone(&connect_failures),
            })
        });

        info!(
            "Redis pool ready (max_active: {}, max_idle: {}, min_idle: {}, max_wait: {:?})",
            config.max_active,
            config.max_idle,
            config.min_idle,
            config.max_wait()
        );

        Ok(Self {
            pool,
            connect_failures,
            config: config.clone(),
        })
    }

    /// Check out a connection, waiting up to the configured max wait
    ///
    /// Fails with `PoolExhausted` on timeout and with `Connection` as soon
    /// as a new connection cannot be opened while waiting.
    pub async fn acquire(&self) -> Result<RedisConnection<'_, M>> {
        let started = Instant::now();
        let checkout = self.pool.get();
        tokio::pin!(checkout);

        loop {
            let connect_failed = self.connect_failures.notified();

            tokio::select! {
                biased;
                result = &mut checkout => {
                    return result.map_err(|e| self.checkout_error(e, started));
                }
                _ = connect_failed => {
                    if let Some(source) = self.connect_failures.last_error() {
                        error!("Failed to open Redis connection: {}", source);
                        return Err(RemoteStoreError::Connection { source });
                    }
                }
            }
        }
    }

    fn checkout_error(&self, error: RunError<RedisError>, started: Instant) -> RemoteStoreError {
        match error {
            RunError::User(source) => {
                error!("Failed to open Redis connection: {}", source);
                RemoteStoreError::Connection { source }
            }
            RunError::TimedOut => {
                let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                warn!(
                    "Redis pool exhausted after {}ms ({})",
                    waited_ms,
                    self.statistics()
                );
                RemoteStoreError::PoolExhausted { waited_ms }
            }
        }
    }

    /// Return a connection to the pool; `None` is a no-op
    ///
    /// Dropping a connection has the same effect.
    pub fn release(&self, connection: Option<RedisConnection<'_, M>>) {
        if let Some(connection) = connection {
            drop(connection);
            debug!("Released Redis connection ({})", self.statistics());
        }
    }

    /// Get connection pool statistics
    pub fn statistics(&self) -> PoolStatistics {
        let state = self.pool.state();
        PoolStatistics {
            connections: state.connections,
            idle_connections: state.idle_connections,
            max_connections: self.config.max_active,
        }
    }

    /// Acquire timeout of this pool
    pub fn max_wait(&self) -> Duration {
        self.config.max_wait()
    }

    /// Settings this pool was built with
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl<M> RedisPool<M>
where
    M: ManageConnection<Error = RedisError>,
    M::Connection: ConnectionLike + Send,
{
    /// Check if Redis is reachable
    ///
    /// Performs a PING command on a pooled connection.
    ///
    /// # Returns
    /// * `Result<bool>` - True if healthy, error otherwise
    pub async fn health_check(&self) -> Result<bool> {
        debug!("Performing Redis health check");

        let mut conn = self.acquire().await?;
        let response: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| RemoteStoreError::command("PING", "", e))?;

        if response == "PONG" {
            debug!("Redis health check passed");
            Ok(true)
        } else {
            warn!("Redis health check returned unexpected response: {}", response);
            Ok(false)
        }
    }
}

/// Connection pool statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatistics {
    /// Total number of connections in the pool
    pub connections: u32,
    /// Number of idle connections
    pub idle_connections: u32,
    /// Maximum allowed connections
    pub max_connections: u32,
}

impl PoolStatistics {
    /// Connections currently checked out
    pub fn active_connections(&self) -> u32 {
        self.connections.saturating_sub(self.idle_connections)
    }
}

impl fmt::Display for PoolStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pool Stats: {}/{} connections ({} idle)",
            self.connections, self.max_connections, self.idle_connections
        )
    }
}

/// Connection manager enforcing `max_idle` and reporting connect failures
///
/// Wraps the manager given to [`RedisPool::with_manager`].
pub struct BoundedManager<M: ManageConnection<Error = RedisError>> {
    inner: M,
    max_idle: u32,
    pool: Weak<Pool<BoundedManager<M>>>,
    connect_failures: Arc<ConnectFailures>,
}

impl<M: ManageConnection<Error = RedisError>> BoundedManager<M> {
    fn idle_is_full(&self) -> bool {
        self.pool
            .upgrade()
            .is_some_and(|pool| pool.state().idle_connections >= self.max_idle)
    }
}

#[async_trait]
impl<M> ManageConnection for BoundedManager<M>
where
    M: ManageConnection<Error = RedisError>,
{
    type Connection = M::Connection;
    type Error = RedisError;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        self.inner.connect().await.map_err(|e| {
            self.connect_failures.record(&e);
            e
        })
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        self.inner.is_valid(conn).await
    }

    // bb8 asks this before pooling a returned connection; past max_idle it is closed
    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        self.inner.has_broken(conn) || self.idle_is_full()
    }
}

/// Last connect failure, announced to callers waiting in `acquire`
#[derive(Debug, Default)]
struct ConnectFailures {
    last: Mutex<Option<(ErrorKind, String)>>,
    notify: Notify,
}

impl ConnectFailures {
    fn record(&self, error: &RedisError) {
        warn!("Redis connection attempt failed: {}", error);
        if let Ok(mut last) = self.last.lock() {
            *last = Some((error.kind(), error.to_string()));
        }
        self.notify.notify_waiters();
    }

    fn notified(&self) -> tokio::sync::futures::Notified<'_> {
        self.notify.notified()
    }

    fn last_error(&self) -> Option<RedisError> {
        let last = self.last.lock().ok()?;
        last.as_ref().map(|(kind, detail)| {
            RedisError::from((*kind, "Failed to open Redis connection", detail.clone()))
        })
    }
}

/// Forwards background connection errors to tracing
#[derive(Debug, Clone, Copy)]
struct TracingErrorSink;

impl<E: fmt::Debug + Send + 'static> ErrorSink<E> for TracingErrorSink {
    fn sink(&self, error: E) {
        error!("Redis connection pool error: {:?}", error);
    }

    fn boxed_clone(&self) -> Box<dyn ErrorSink<E>> {
        Box::new(*self)
    }
}

fn connection_info(config: &CacheConfig) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(config.host.clone(), config.port),
        redis: RedisConnectionInfo {
            db: i64::from(config.database),
            username: config.username.clone(),
            password: config.password.clone(),
            ..Default::default()
        },
    }
}
