//! In-memory Redis double
//!
//! [`MemoryStore`] keeps a shared keyspace in process and answers the
//! command subset used by [`RedisUtils`] with the same replies and errors a
//! Redis server gives. [`MemoryConnection`] speaks to it through
//! `redis::aio::ConnectionLike`, and [`MemoryConnectionManager`] lets bb8
//! pool such connections, so the real pool and facade run unchanged in tests.

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bb8::ManageConnection;
use rand::seq::IteratorRandom;
use redis::{
    aio::ConnectionLike, Arg, Cmd, ErrorKind, Pipeline, RedisError, RedisFuture, RedisResult,
    Value,
};
use tracing::debug;

use ck_core::cache::{pattern_matches, KeyNamespace};
use ck_shared::config::PoolConfig;

use super::pool::RedisPool;
use super::redis_utils::RedisUtils;
use crate::errors::Result;

const WRONG_TYPE: &str = "Operation against a key holding the wrong kind of value";
const NOT_AN_INTEGER: &str = "value is not an integer or out of range";

/// Value stored under one key
#[derive(Debug, Clone)]
enum Entry {
    Str(String),
    Hash(HashMap<String, String>),
    Set(HashSet<String>),
    ZSet(HashMap<String, f64>),
}

impl Entry {
    fn type_name(&self) -> &'static str {
        match self {
            Entry::Str(_) => "string",
            Entry::Hash(_) => "hash",
            Entry::Set(_) => "set",
            Entry::ZSet(_) => "zset",
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Entry::Str(_) => false,
            Entry::Hash(hash) => hash.is_empty(),
            Entry::Set(set) => set.is_empty(),
            Entry::ZSet(zset) => zset.is_empty(),
        }
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    entries: HashMap<String, Entry>,
    failing: bool,
    refusing: bool,
}

/// Shared in-process keyspace
///
/// Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<Keyspace>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While `failing` is set, every command fails with an I/O error
    pub fn fail_commands(&self, failing: bool) {
        debug!("In-memory store failing commands: {}", failing);
        self.lock().failing = failing;
    }

    /// While `refusing` is set, opening a connection fails as if the
    /// server were unreachable; open connections keep working
    pub fn refuse_connections(&self, refusing: bool) {
        debug!("In-memory store refusing connections: {}", refusing);
        self.lock().refusing = refusing;
    }

    fn check_reachable(&self) -> RedisResult<()> {
        if self.lock().refusing {
            return Err(RedisError::from(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "in-memory store is refusing connections",
            )));
        }
        Ok(())
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every key
    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Run one command given as its arguments, name first
    pub fn execute(&self, args: &[String]) -> RedisResult<Value> {
        let mut keyspace = self.lock();
        if keyspace.failing {
            return Err(RedisError::from(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "in-memory store is failing commands",
            )));
        }
        keyspace.execute(args)
    }

    fn lock(&self) -> MutexGuard<'_, Keyspace> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Keyspace {
    fn execute(&mut self, args: &[String]) -> RedisResult<Value> {
        let (name, args) = args
            .split_first()
            .ok_or_else(|| response_error("ERR", "empty command"))?;
        let name = name.to_ascii_uppercase();

        match (name.as_str(), args) {
            ("PING", []) => Ok(Value::Status("PONG".to_string())),
            ("FLUSHDB", []) => {
                self.entries.clear();
                Ok(Value::Okay)
            }

            ("SET", [key, value]) => {
                self.entries.insert(key.clone(), Entry::Str(value.clone()));
                Ok(Value::Okay)
            }
            ("GET", [key]) => Ok(match self.string(key)? {
                Some(value) => Value::Data(value.as_bytes().to_vec()),
                None => Value::Nil,
            }),
            ("KEYS", [pattern]) => {
                let mut keys: Vec<&String> = self
                    .entries
                    .keys()
                    .filter(|key| pattern_matches(pattern, key))
                    .collect();
                keys.sort_unstable();
                Ok(bulk(keys))
            }
            ("DEL", keys) if !keys.is_empty() => {
                let removed = keys
                    .iter()
                    .filter(|key| self.entries.remove(key.as_str()).is_some())
                    .count();
                Ok(int(removed))
            }
            ("EXISTS", keys) if !keys.is_empty() => {
                let found = keys
                    .iter()
                    .filter(|key| self.entries.contains_key(key.as_str()))
                    .count();
                Ok(int(found))
            }
            ("TYPE", [key]) => {
                let name = self.entries.get(key).map_or("none", Entry::type_name);
                Ok(Value::Status(name.to_string()))
            }
            ("RENAME", [old_key, new_key]) => {
                let entry = self
                    .entries
                    .remove(old_key)
                    .ok_or_else(|| response_error("ERR", "no such key"))?;
                self.entries.insert(new_key.clone(), entry);
                Ok(Value::Okay)
            }
            ("STRLEN", [key]) => Ok(int(self.string(key)?.map_or(0, str::len))),
            ("APPEND", [key, value]) => {
                let len = match self.entries.get_mut(key) {
                    Some(Entry::Str(current)) => {
                        current.push_str(value);
                        current.len()
                    }
                    Some(_) => return Err(wrong_type()),
                    None => {
                        self.entries.insert(key.clone(), Entry::Str(value.clone()));
                        value.len()
                    }
                };
                Ok(int(len))
            }
            ("INCR", [key]) => self.incr_by(key, 1),
            ("DECR", [key]) => self.incr_by(key, -1),
            ("INCRBY", [key, delta]) => self.incr_by(key, parse_int(delta)?),
            ("DECRBY", [key, delta]) => {
                let delta = parse_int(delta)?
                    .checked_neg()
                    .ok_or_else(|| response_error("ERR", "decrement would overflow"))?;
                self.incr_by(key, delta)
            }

            ("HSET", [key, pairs @ ..]) if !pairs.is_empty() && pairs.len() % 2 == 0 => {
                let hash = self.hash_mut(key)?;
                let added = pairs
                    .chunks_exact(2)
                    .filter(|pair| hash.insert(pair[0].clone(), pair[1].clone()).is_none())
                    .count();
                Ok(int(added))
            }
            ("HGET", [key, field]) => Ok(match self.hash(key)?.and_then(|hash| hash.get(field)) {
                Some(value) => Value::Data(value.as_bytes().to_vec()),
                None => Value::Nil,
            }),
            ("HINCRBY", [key, field, delta]) => {
                let delta = parse_int(delta)?;
                let hash = self.hash_mut(key)?;
                let current = match hash.get(field) {
                    Some(value) => value
                        .parse::<i64>()
                        .map_err(|_| response_error("ERR", "hash value is not an integer"))?,
                    None => 0,
                };
                let next = current
                    .checked_add(delta)
                    .ok_or_else(|| response_error("ERR", "increment or decrement would overflow"))?;
                hash.insert(field.clone(), next.to_string());
                Ok(Value::Int(next))
            }
            ("HGETALL", [key]) => {
                let mut pairs = Vec::new();
                if let Some(hash) = self.hash(key)? {
                    for (field, value) in hash {
                        pairs.push(data(field));
                        pairs.push(data(value));
                    }
                }
                Ok(Value::Bulk(pairs))
            }
            ("HDEL", [key, fields @ ..]) if !fields.is_empty() => {
                let removed = match self.entries.get_mut(key) {
                    Some(Entry::Hash(hash)) => fields
                        .iter()
                        .filter(|field| hash.remove(field.as_str()).is_some())
                        .count(),
                    Some(_) => return Err(wrong_type()),
                    None => 0,
                };
                self.remove_if_empty(key);
                Ok(int(removed))
            }
            ("HLEN", [key]) => Ok(int(self.hash(key)?.map_or(0, HashMap::len))),
            ("HKEYS", [key]) => Ok(bulk(self.hash(key)?.into_iter().flat_map(|hash| hash.keys()))),

            ("SADD", [key, members @ ..]) if !members.is_empty() => {
                let set = match self
                    .entries
                    .entry(key.clone())
                    .or_insert_with(|| Entry::Set(HashSet::new()))
                {
                    Entry::Set(set) => set,
                    _ => return Err(wrong_type()),
                };
                let added = members
                    .iter()
                    .filter(|member| set.insert((*member).clone()))
                    .count();
                Ok(int(added))
            }
            ("SRANDMEMBER", [key]) => {
                let set = match self.entries.get(key) {
                    Some(Entry::Set(set)) => Some(set),
                    Some(_) => return Err(wrong_type()),
                    None => None,
                };
                let member = set.and_then(|set| set.iter().choose(&mut rand::thread_rng()));
                Ok(member.map_or(Value::Nil, |member| data(member)))
            }

            ("ZADD", [key, pairs @ ..]) if !pairs.is_empty() && pairs.len() % 2 == 0 => {
                let scored = pairs
                    .chunks_exact(2)
                    .map(|pair| -> RedisResult<(f64, String)> {
                        Ok((parse_score(&pair[0])?, pair[1].clone()))
                    })
                    .collect::<RedisResult<Vec<(f64, String)>>>()?;
                let zset = match self
                    .entries
                    .entry(key.clone())
                    .or_insert_with(|| Entry::ZSet(HashMap::new()))
                {
                    Entry::ZSet(zset) => zset,
                    _ => return Err(wrong_type()),
                };
                let added = scored
                    .into_iter()
                    .filter(|(score, member)| zset.insert(member.clone(), *score).is_none())
                    .count();
                Ok(int(added))
            }
            ("ZRANGE", [key, start, stop]) => {
                let ranked = self.ranked(key)?;
                let range = rank_range(ranked.len(), parse_int(start)?, parse_int(stop)?);
                Ok(bulk(range.map_or(&[][..], |(from, to)| &ranked[from..=to])))
            }
            ("ZREVRANGE", [key, start, stop]) => {
                let mut ranked = self.ranked(key)?;
                ranked.reverse();
                let range = rank_range(ranked.len(), parse_int(start)?, parse_int(stop)?);
                Ok(bulk(range.map_or(&[][..], |(from, to)| &ranked[from..=to])))
            }
            ("ZREMRANGEBYRANK", [key, start, stop]) => {
                let ranked: Vec<String> = self.ranked(key)?.into_iter().cloned().collect();
                let Some((from, to)) = rank_range(ranked.len(), parse_int(start)?, parse_int(stop)?)
                else {
                    return Ok(int(0));
                };
                if let Some(Entry::ZSet(zset)) = self.entries.get_mut(key) {
                    for member in &ranked[from..=to] {
                        zset.remove(member);
                    }
                }
                self.remove_if_empty(key);
                Ok(int(to - from + 1))
            }

            _ => Err(response_error(
                "ERR",
                format!("unknown command or wrong number of arguments for '{}'", name),
            )),
        }
    }

    fn string(&self, key: &str) -> RedisResult<Option<&str>> {
        match self.entries.get(key) {
            Some(Entry::Str(value)) => Ok(Some(value)),
            Some(_) => Err(wrong_type()),
            None => Ok(None),
        }
    }

    fn hash(&self, key: &str) -> RedisResult<Option<&HashMap<String, String>>> {
        match self.entries.get(key) {
            Some(Entry::Hash(hash)) => Ok(Some(hash)),
            Some(_) => Err(wrong_type()),
            None => Ok(None),
        }
    }

    fn hash_mut(&mut self, key: &str) -> RedisResult<&mut HashMap<String, String>> {
        match self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()))
        {
            Entry::Hash(hash) => Ok(hash),
            _ => Err(wrong_type()),
        }
    }

    /// Members of a sorted set by ascending score, ties by member
    fn ranked(&self, key: &str) -> RedisResult<Vec<&String>> {
        let zset = match self.entries.get(key) {
            Some(Entry::ZSet(zset)) => zset,
            Some(_) => return Err(wrong_type()),
            None => return Ok(Vec::new()),
        };
        let mut members: Vec<(&String, f64)> = zset.iter().map(|(m, s)| (m, *s)).collect();
        members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        Ok(members.into_iter().map(|(member, _)| member).collect())
    }

    fn incr_by(&mut self, key: &str, delta: i64) -> RedisResult<Value> {
        let current = match self.string(key)? {
            Some(value) => value
                .parse::<i64>()
                .map_err(|_| response_error("ERR", NOT_AN_INTEGER))?,
            None => 0,
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| response_error("ERR", "increment or decrement would overflow"))?;
        self.entries
            .insert(key.to_string(), Entry::Str(next.to_string()));
        Ok(Value::Int(next))
    }

    /// Aggregates left without members disappear, as in Redis
    fn remove_if_empty(&mut self, key: &str) {
        if self.entries.get(key).is_some_and(Entry::is_empty) {
            self.entries.remove(key);
        }
    }
}

/// Clamp a Redis rank interval to `0..len`; None when it selects nothing
fn rank_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = i64::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((usize::try_from(start).ok()?, usize::try_from(stop).ok()?))
}

fn parse_int(value: &str) -> RedisResult<i64> {
    value
        .parse()
        .map_err(|_| response_error("ERR", NOT_AN_INTEGER))
}

fn parse_score(value: &str) -> RedisResult<f64> {
    match value.parse::<f64>() {
        Ok(score) if !score.is_nan() => Ok(score),
        _ => Err(response_error("ERR", "value is not a valid float")),
    }
}

fn data(value: &str) -> Value {
    Value::Data(value.as_bytes().to_vec())
}

fn int(count: usize) -> Value {
    Value::Int(i64::try_from(count).unwrap_or(i64::MAX))
}

fn bulk<S: AsRef<str>>(values: impl IntoIterator<Item = S>) -> Value {
    Value::Bulk(values.into_iter().map(|value| data(value.as_ref())).collect())
}

fn response_error(code: &'static str, detail: impl Into<String>) -> RedisError {
    RedisError::from((ErrorKind::ResponseError, code, detail.into()))
}

fn wrong_type() -> RedisError {
    response_error("WRONGTYPE", WRONG_TYPE)
}

/// Connection to a [`MemoryStore`]
#[derive(Debug, Clone)]
pub struct MemoryConnection {
    store: MemoryStore,
}

impl MemoryConnection {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl ConnectionLike for MemoryConnection {
    fn req_packed_command<'a>(&'a mut self, cmd: &'a Cmd) -> RedisFuture<'a, Value> {
        let args: Vec<String> = cmd
            .args_iter()
            .filter_map(|arg| match arg {
                Arg::Simple(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
                Arg::Cursor => None,
            })
            .collect();
        let reply = self.store.execute(&args);
        Box::pin(async move { reply })
    }

    fn req_packed_commands<'a>(
        &'a mut self,
        _cmd: &'a Pipeline,
        _offset: usize,
        _count: usize,
    ) -> RedisFuture<'a, Vec<Value>> {
        Box::pin(async move {
            Err(RedisError::from((
                ErrorKind::ClientError,
                "pipelines are not supported by the in-memory store",
            )))
        })
    }

    fn get_db(&self) -> i64 {
        0
    }
}

/// bb8 connection manager handing out [`MemoryConnection`]s
#[derive(Debug, Clone, Default)]
pub struct MemoryConnectionManager {
    store: MemoryStore,
}

impl MemoryConnectionManager {
    pub fn new(store: MemoryStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

#[async_trait]
impl ManageConnection for MemoryConnectionManager {
    type Connection = MemoryConnection;
    type Error = RedisError;

    async fn connect(&self) -> std::result::Result<Self::Connection, Self::Error> {
        self.store.check_reachable()?;
        Ok(MemoryConnection::new(self.store.clone()))
    }

    // connections to the in-process store cannot go stale
    async fn is_valid(&self, _conn: &mut Self::Connection) -> std::result::Result<(), Self::Error> {
        Ok(())
    }

    fn has_broken(&self, _conn: &mut Self::Connection) -> bool {
        false
    }
}

impl RedisUtils<MemoryConnectionManager> {
    /// Facade over a fresh in-memory store
    ///
    /// Must be called from within a Tokio runtime.
    pub fn in_memory(namespace: &str, config: &PoolConfig) -> Result<Self> {
        Self::in_memory_with_store(MemoryStore::new(), namespace, config)
    }

    /// Facade over an existing in-memory store
    pub fn in_memory_with_store(
        store: MemoryStore,
        namespace: &str,
        config: &PoolConfig,
    ) -> Result<Self> {
        let namespace = KeyNamespace::new(namespace)?;
        let pool = RedisPool::with_manager(MemoryConnectionManager::new(store), config)?;
        Ok(Self::new(pool, namespace))
    }
}
