//! Redis command facade
//!
//! [`RedisUtils`] exposes one async method per supported Redis command.
//! Every method checks a connection out of the pool, performs exactly one
//! command and lets the connection guard return it to the pool on every
//! exit path. Values are stringified with `Display` before they are sent.

use std::collections::HashMap;
use std::fmt::Display;

use bb8::ManageConnection;
use bb8_redis::RedisConnectionManager;
use redis::{aio::ConnectionLike, AsyncCommands, RedisError};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};

use ck_core::cache::{CacheKey, KeyNamespace, KeyType};
use ck_shared::config::CacheConfig;

use super::pool::RedisPool;
use crate::errors::{RemoteStoreError, Result};

/// Pooled Redis command facade
pub struct RedisUtils<M: ManageConnection<Error = RedisError> = RedisConnectionManager> {
    /// Connection pool shared by all commands
    pool: RedisPool<M>,
    /// Namespace prefixed to generated keys
    namespace: KeyNamespace,
}

impl<M: ManageConnection<Error = RedisError>> Clone for RedisUtils<M> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

impl RedisUtils<RedisConnectionManager> {
    /// Build the facade and its pool from cache configuration
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        let namespace = KeyNamespace::new(config.namespace.as_str())?;
        let pool = RedisPool::new(config)?;
        Ok(Self::new(pool, namespace))
    }
}

impl<M> RedisUtils<M>
where
    M: ManageConnection<Error = RedisError>,
    M::Connection: ConnectionLike + Send,
{
    /// Create a facade over an existing pool
    pub fn new(pool: RedisPool<M>, namespace: KeyNamespace) -> Self {
        Self { pool, namespace }
    }

    /// The pool commands are executed on
    pub fn pool(&self) -> &RedisPool<M> {
        &self.pool
    }

    /// Namespace used by the key helpers
    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    /// `{namespace}_{tag}`
    pub fn redis_key(&self, tag: CacheKey) -> String {
        self.namespace.key(tag)
    }

    /// `{namespace}_{tag}::{id}`; fails when `id` renders empty
    pub fn redis_key_with_id(&self, tag: CacheKey, id: impl Display) -> Result<String> {
        Ok(self.namespace.key_with_id(tag, id)?)
    }

    /// `{namespace}_{tag}::*`
    pub fn redis_key_pattern(&self, tag: CacheKey) -> String {
        self.namespace.pattern(tag)
    }

    /// Set a string value
    ///
    /// # Returns
    /// * `Result<String>` - The server status reply, `"OK"`
    pub async fn set(&self, key: &str, value: impl Display) -> Result<String> {
        debug!("Setting key '{}'", key);

        let mut conn = self.pool.acquire().await?;
        let reply: String = conn
            .set(key, value.to_string())
            .await
            .map_err(|e| RemoteStoreError::command("SET", key, e))?;

        Ok(reply)
    }

    /// Get a string value
    ///
    /// # Returns
    /// * `Result<Option<String>>` - Stored value or None if not found
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        debug!("Getting key '{}'", key);

        let mut conn = self.pool.acquire().await?;
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| RemoteStoreError::command("GET", key, e))?;

        if value.is_none() {
            debug!("Key '{}' not found", key);
        }
        Ok(value)
    }

    /// List keys matching a glob pattern
    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        debug!("Listing keys matching '{}'", pattern);

        let mut conn = self.pool.acquire().await?;
        let keys: Vec<String> = conn
            .keys(pattern)
            .await
            .map_err(|e| RemoteStoreError::command("KEYS", pattern, e))?;

        debug!("{} keys match '{}'", keys.len(), pattern);
        Ok(keys)
    }

    /// Delete a key
    ///
    /// # Returns
    /// * `Result<bool>` - True if the key was deleted, false if not found
    pub async fn del(&self, key: &str) -> Result<bool> {
        debug!("Deleting key '{}'", key);

        let mut conn = self.pool.acquire().await?;
        let deleted: u64 = conn
            .del(key)
            .await
            .map_err(|e| RemoteStoreError::command("DEL", key, e))?;

        Ok(deleted > 0)
    }

    /// Delete several keys with one command
    ///
    /// # Returns
    /// * `Result<u64>` - Number of keys removed; 0 for an empty slice
    pub async fn del_many<K: AsRef<str>>(&self, keys: &[K]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let keys: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
        debug!("Deleting {} keys", keys.len());

        let mut conn = self.pool.acquire().await?;
        let deleted: u64 = conn
            .del(&keys)
            .await
            .map_err(|e| RemoteStoreError::command("DEL", keys.join(" "), e))?;

        Ok(deleted)
    }

    /// Length of a string value, 0 when the key is missing
    pub async fn strlen(&self, key: &str) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        conn.strlen(key)
            .await
            .map_err(|e| RemoteStoreError::command("STRLEN", key, e))
    }

    /// Check if a key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        debug!("Checking if key '{}' exists", key);

        let mut conn = self.pool.acquire().await?;
        let exists: bool = conn
            .exists(key)
            .await
            .map_err(|e| RemoteStoreError::command("EXISTS", key, e))?;

        debug!("Key '{}' exists: {}", key, exists);
        Ok(exists)
    }

    /// Type of the value stored at a key
    pub async fn key_type(&self, key: &str) -> Result<KeyType> {
        let mut conn = self.pool.acquire().await?;
        let reply: String = conn
            .key_type(key)
            .await
            .map_err(|e| RemoteStoreError::command("TYPE", key, e))?;

        Ok(KeyType::from(reply.as_str()))
    }

    /// Rename a key; a missing source key is a command error
    pub async fn rename(&self, old_key: &str, new_key: &str) -> Result<String> {
        debug!("Renaming key '{}' to '{}'", old_key, new_key);

        let mut conn = self.pool.acquire().await?;
        conn.rename(old_key, new_key)
            .await
            .map_err(|e| RemoteStoreError::command("RENAME", old_key, e))
    }

    /// Increment a counter by one; a missing key counts from 0
    pub async fn incr(&self, key: &str) -> Result<i64> {
        self.incr_by(key, 1).await
    }

    /// Increment a counter by `delta`
    pub async fn incr_by(&self, key: &str, delta: i64) -> Result<i64> {
        debug!("Incrementing counter '{}' by {}", key, delta);

        let mut conn = self.pool.acquire().await?;
        let count: i64 = conn
            .incr(key, delta)
            .await
            .map_err(|e| RemoteStoreError::command("INCRBY", key, e))?;

        debug!("Counter '{}' is now {}", key, count);
        Ok(count)
    }

    /// Decrement a counter by one
    pub async fn decr(&self, key: &str) -> Result<i64> {
        self.decr_by(key, 1).await
    }

    /// Decrement a counter by `delta`
    pub async fn decr_by(&self, key: &str, delta: i64) -> Result<i64> {
        debug!("Decrementing counter '{}' by {}", key, delta);

        let mut conn = self.pool.acquire().await?;
        conn.decr(key, delta)
            .await
            .map_err(|e| RemoteStoreError::command("DECRBY", key, e))
    }

    /// Append to a string value
    ///
    /// # Returns
    /// * `Result<u64>` - Length of the string after the append
    pub async fn append(&self, key: &str, value: impl Display) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        conn.append(key, value.to_string())
            .await
            .map_err(|e| RemoteStoreError::command("APPEND", key, e))
    }

    /// Set a hash field
    ///
    /// # Returns
    /// * `Result<u64>` - 1 if the field is new, 0 if it was overwritten
    pub async fn hset(&self, key: &str, field: &str, value: impl Display) -> Result<u64> {
        debug!("Setting field '{}' of hash '{}'", field, key);

        let mut conn = self.pool.acquire().await?;
        conn.hset(key, field, value.to_string())
            .await
            .map_err(|e| RemoteStoreError::command("HSET", key, e))
    }

    /// Get a hash field
    pub async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        debug!("Getting field '{}' of hash '{}'", field, key);

        let mut conn = self.pool.acquire().await?;
        conn.hget(key, field)
            .await
            .map_err(|e| RemoteStoreError::command("HGET", key, e))
    }

    /// Increment an integer hash field by `delta`
    pub async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut conn = self.pool.acquire().await?;
        conn.hincr(key, field, delta)
            .await
            .map_err(|e| RemoteStoreError::command("HINCRBY", key, e))
    }

    /// All fields and values of a hash; empty when the key is missing
    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        debug!("Getting all fields of hash '{}'", key);

        let mut conn = self.pool.acquire().await?;
        conn.hgetall(key)
            .await
            .map_err(|e| RemoteStoreError::command("HGETALL", key, e))
    }

    /// Delete hash fields
    ///
    /// # Returns
    /// * `Result<u64>` - Number of fields removed; 0 for an empty slice
    pub async fn hdel<F: AsRef<str>>(&self, key: &str, fields: &[F]) -> Result<u64> {
        if fields.is_empty() {
            return Ok(0);
        }
        let fields: Vec<&str> = fields.iter().map(AsRef::as_ref).collect();
        debug!("Deleting {} fields of hash '{}'", fields.len(), key);

        let mut conn = self.pool.acquire().await?;
        conn.hdel(key, fields)
            .await
            .map_err(|e| RemoteStoreError::command("HDEL", key, e))
    }

    /// Number of fields in a hash
    pub async fn hlen(&self, key: &str) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        conn.hlen(key)
            .await
            .map_err(|e| RemoteStoreError::command("HLEN", key, e))
    }

    /// Field names of a hash
    pub async fn hkeys(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        conn.hkeys(key)
            .await
            .map_err(|e| RemoteStoreError::command("HKEYS", key, e))
    }

    /// Add members to a set
    ///
    /// # Returns
    /// * `Result<u64>` - Number of members that were not already present
    pub async fn sadd<V: Display>(&self, key: &str, values: &[V]) -> Result<u64> {
        if values.is_empty() {
            return Ok(0);
        }
        let members: Vec<String> = values.iter().map(ToString::to_string).collect();
        debug!("Adding {} members to set '{}'", members.len(), key);

        let mut conn = self.pool.acquire().await?;
        conn.sadd(key, members)
            .await
            .map_err(|e| RemoteStoreError::command("SADD", key, e))
    }

    /// A random member of a set, None when the set is empty or missing
    pub async fn srandmember(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        conn.srandmember(key)
            .await
            .map_err(|e| RemoteStoreError::command("SRANDMEMBER", key, e))
    }

    /// Add a member with a score, updating the score of an existing member
    ///
    /// # Returns
    /// * `Result<u64>` - 1 if the member is new, 0 otherwise
    pub async fn zadd(&self, key: &str, score: f64, value: impl Display) -> Result<u64> {
        debug!("Adding member with score {} to sorted set '{}'", score, key);

        let mut conn = self.pool.acquire().await?;
        conn.zadd(key, value.to_string(), score)
            .await
            .map_err(|e| RemoteStoreError::command("ZADD", key, e))
    }

    /// Members by ascending score within the inclusive rank interval
    ///
    /// Negative ranks count from the end, `-1` being the last member.
    pub async fn zrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        conn.zrange(key, start, stop)
            .await
            .map_err(|e| RemoteStoreError::command("ZRANGE", key, e))
    }

    /// Members by descending score within the inclusive rank interval
    pub async fn zrevrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        conn.zrevrange(key, start, stop)
            .await
            .map_err(|e| RemoteStoreError::command("ZREVRANGE", key, e))
    }

    /// Remove members by ascending rank
    ///
    /// # Returns
    /// * `Result<u64>` - Number of members removed
    pub async fn zremrangebyrank(&self, key: &str, start: isize, stop: isize) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        conn.zremrangebyrank(key, start, stop)
            .await
            .map_err(|e| RemoteStoreError::command("ZREMRANGEBYRANK", key, e))
    }

    /// Store a value as JSON
    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<String> {
        let json = serde_json::to_string(value)?;
        self.set(key, json).await
    }

    /// Read a JSON value; None when the key is missing
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Delete every key matching `pattern`
    ///
    /// Not atomic: KEYS and DEL run on separate connections, so the count
    /// is what was actually removed, not a snapshot.
    ///
    /// # Returns
    /// * `Result<u64>` - Number of keys removed, 0 when nothing matched
    pub async fn delete_all_matching(&self, pattern: &str) -> Result<u64> {
        let keys = self.keys(pattern).await?;
        if keys.is_empty() {
            debug!("No keys match '{}'", pattern);
            return Ok(0);
        }

        let deleted = self.del_many(&keys).await?;
        info!("Deleted {} keys matching '{}'", deleted, pattern);
        Ok(deleted)
    }

    /// Delete every field of every hash matching `pattern`
    ///
    /// Each matched key is enumerated with HKEYS and cleared with HDEL, one
    /// connection per step. A matched key holding another type fails the
    /// whole call with a command error.
    ///
    /// # Returns
    /// * `Result<u64>` - Total number of fields removed
    pub async fn hdel_all_matching(&self, pattern: &str) -> Result<u64> {
        let keys = self.keys(pattern).await?;

        let mut removed = 0;
        for key in &keys {
            let fields = self.hkeys(key).await?;
            removed += self.hdel(key, &fields).await?;
        }

        info!(
            "Deleted {} fields from {} hashes matching '{}'",
            removed,
            keys.len(),
            pattern
        );
        Ok(removed)
    }
}
