//! Unit tests for the in-memory Redis double

use redis::{ErrorKind, Value};

use crate::cache::memory::{MemoryConnection, MemoryStore};

fn run(store: &MemoryStore, command: &[&str]) -> redis::RedisResult<Value> {
    let args: Vec<String> = command.iter().map(|arg| arg.to_string()).collect();
    store.execute(&args)
}

fn bulk_strings(value: Value) -> Vec<String> {
    match value {
        Value::Bulk(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Data(bytes) => String::from_utf8(bytes).unwrap(),
                other => panic!("unexpected item {:?}", other),
            })
            .collect(),
        other => panic!("expected bulk reply, got {:?}", other),
    }
}

#[test]
fn test_ping_and_unknown_command() {
    let store = MemoryStore::new();

    assert_eq!(run(&store, &["PING"]).unwrap(), Value::Status("PONG".to_string()));
    assert_eq!(run(&store, &["ping"]).unwrap(), Value::Status("PONG".to_string()));

    let err = run(&store, &["LPUSH", "list", "x"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResponseError);

    // wrong arity
    assert!(run(&store, &["GET"]).is_err());
    assert!(run(&store, &["HSET", "h", "only-field"]).is_err());
    assert!(run(&store, &[]).is_err());
}

#[test]
fn test_keys_uses_glob_patterns() {
    let store = MemoryStore::new();
    for key in ["USER::1", "USER::2", "USER::10", "ARTICLE::1"] {
        run(&store, &["SET", key, "v"]).unwrap();
    }

    let keys = bulk_strings(run(&store, &["KEYS", "USER::?"]).unwrap());
    assert_eq!(keys, vec!["USER::1", "USER::2"]);

    let keys = bulk_strings(run(&store, &["KEYS", "*::1"]).unwrap());
    assert_eq!(keys, vec!["ARTICLE::1", "USER::1"]);

    let keys = bulk_strings(run(&store, &["KEYS", "USER::[^1]"]).unwrap());
    assert_eq!(keys, vec!["USER::2"]);

    assert_eq!(bulk_strings(run(&store, &["KEYS", "*"]).unwrap()).len(), 4);
}

#[test]
fn test_empty_aggregates_are_removed() {
    let store = MemoryStore::new();

    run(&store, &["HSET", "h", "f", "v"]).unwrap();
    run(&store, &["HDEL", "h", "f"]).unwrap();
    assert_eq!(run(&store, &["EXISTS", "h"]).unwrap(), Value::Int(0));

    run(&store, &["ZADD", "z", "1", "a", "2", "b"]).unwrap();
    assert_eq!(run(&store, &["ZREMRANGEBYRANK", "z", "0", "-1"]).unwrap(), Value::Int(2));
    assert!(store.is_empty());
}

#[test]
fn test_wrong_type_errors() {
    let store = MemoryStore::new();
    run(&store, &["SADD", "s", "m"]).unwrap();

    for command in [
        &["GET", "s"][..],
        &["HSET", "s", "f", "v"],
        &["INCRBY", "s", "1"],
        &["ZADD", "s", "1", "m"],
    ] {
        let err = run(&store, command).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ResponseError);
        assert!(err.to_string().contains("WRONGTYPE"), "{:?}: {}", command, err);
    }

    // the set is untouched
    assert_eq!(run(&store, &["TYPE", "s"]).unwrap(), Value::Status("set".to_string()));
}

#[test]
fn test_integer_errors() {
    let store = MemoryStore::new();
    run(&store, &["SET", "n", "abc"]).unwrap();

    assert!(run(&store, &["INCRBY", "n", "1"]).is_err());
    assert!(run(&store, &["INCRBY", "m", "x"]).is_err());

    let max = i64::MAX.to_string();
    run(&store, &["SET", "max", max.as_str()]).unwrap();
    assert!(run(&store, &["INCRBY", "max", "1"]).is_err());

    run(&store, &["HSET", "h", "f", "1.5"]).unwrap();
    assert!(run(&store, &["HINCRBY", "h", "f", "1"]).is_err());
}

#[test]
fn test_rank_ranges() {
    let store = MemoryStore::new();
    run(&store, &["ZADD", "z", "1", "a", "2", "b", "3", "c"]).unwrap();

    let range = |start: &str, stop: &str| {
        bulk_strings(run(&store, &["ZRANGE", "z", start, stop]).unwrap())
    };

    assert_eq!(range("0", "-1"), vec!["a", "b", "c"]);
    assert_eq!(range("-100", "1"), vec!["a", "b"]);
    assert_eq!(range("1", "100"), vec!["b", "c"]);
    assert_eq!(range("2", "1"), Vec::<String>::new());
    assert_eq!(range("0", "-4"), Vec::<String>::new());
    assert_eq!(range("3", "5"), Vec::<String>::new());

    let missing = bulk_strings(run(&store, &["ZRANGE", "nope", "0", "-1"]).unwrap());
    assert!(missing.is_empty());
}

#[test]
fn test_sorted_set_ties_order_by_member() {
    let store = MemoryStore::new();
    run(&store, &["ZADD", "z", "1", "b", "1", "a", "0", "c"]).unwrap();

    let members = bulk_strings(run(&store, &["ZRANGE", "z", "0", "-1"]).unwrap());
    assert_eq!(members, vec!["c", "a", "b"]);

    assert!(run(&store, &["ZADD", "z", "nan", "d"]).is_err());
    assert!(run(&store, &["ZADD", "z", "high", "d"]).is_err());
}

#[test]
fn test_fail_commands_mode() {
    let store = MemoryStore::new();
    run(&store, &["SET", "k", "v"]).unwrap();

    store.fail_commands(true);
    let err = run(&store, &["GET", "k"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IoError);

    store.fail_commands(false);
    assert_eq!(run(&store, &["GET", "k"]).unwrap(), Value::Data(b"v".to_vec()));
}

#[test]
fn test_clones_share_the_keyspace() {
    let store = MemoryStore::new();
    let other = store.clone();

    run(&store, &["SET", "k", "v"]).unwrap();
    assert_eq!(other.len(), 1);

    other.clear();
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_connection_speaks_redis_commands() {
    use redis::AsyncCommands;

    let store = MemoryStore::new();
    let mut conn = MemoryConnection::new(store.clone());

    let _: () = conn.set("k", "v").await.unwrap();
    let value: Option<String> = conn.get("k").await.unwrap();
    assert_eq!(value.as_deref(), Some("v"));

    let pong: String = redis::cmd("PING").query_async(&mut conn).await.unwrap();
    assert_eq!(pong, "PONG");
    assert_eq!(conn.store().len(), 1);
}

#[tokio::test]
async fn test_pipelines_are_rejected() {
    let mut conn = MemoryConnection::new(MemoryStore::new());

    let result: redis::RedisResult<(String,)> =
        redis::pipe().cmd("PING").query_async(&mut conn).await;
    assert!(result.is_err());
}
