//! Integration tests for the Redis command facade
//!
//! These tests require a running Redis instance to execute.
//! Connection settings come from `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`, ...
//! Run with: cargo test -p ck_infra --test redis_integration -- --ignored

use std::time::Duration;

use ck_infra::cache::{CacheConfig, CacheKey, KeyType, PoolConfig, RedisUtils};
use ck_infra::RemoteStoreError;

/// Facade on a namespace unique to this test run
fn facade() -> RedisUtils {
    let namespace = format!("IT{}", uuid::Uuid::new_v4().simple());
    let config = CacheConfig::from_env()
        .with_namespace(namespace)
        .with_pool(PoolConfig::new(4, Duration::from_secs(2)));

    RedisUtils::from_config(&config).expect("Failed to build Redis facade")
}

async fn cleanup(utils: &RedisUtils) {
    let pattern = format!("{}_*", utils.namespace());
    let _ = utils.delete_all_matching(&pattern).await;
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_redis_connection() {
    let utils = facade();
    assert!(utils.pool().health_check().await.unwrap(), "Failed to connect to Redis");
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_set_get_and_delete() {
    let utils = facade();
    let key = utils.redis_key_with_id(CacheKey::UserToken, 1).unwrap();

    assert_eq!(utils.set(&key, "token-1").await.unwrap(), "OK");
    assert_eq!(utils.get(&key).await.unwrap(), Some("token-1".to_string()));
    assert_eq!(utils.key_type(&key).await.unwrap(), KeyType::String);
    assert_eq!(utils.append(&key, "-x").await.unwrap(), 9);
    assert_eq!(utils.strlen(&key).await.unwrap(), 9);

    assert!(utils.del(&key).await.unwrap());
    assert!(!utils.del(&key).await.unwrap());

    cleanup(&utils).await;
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_counter() {
    let utils = facade();
    let key = utils.redis_key_with_id(CacheKey::ArticleViews, 42).unwrap();

    assert_eq!(utils.incr(&key).await.unwrap(), 1);
    assert_eq!(utils.incr(&key).await.unwrap(), 2);
    assert_eq!(utils.decr_by(&key, 5).await.unwrap(), -3);

    cleanup(&utils).await;
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_rename_missing_key_fails() {
    let utils = facade();
    let key = utils.redis_key_with_id(CacheKey::UserInfo, "missing").unwrap();
    let target = utils.redis_key_with_id(CacheKey::UserInfo, "target").unwrap();

    let err = utils.rename(&key, &target).await.unwrap_err();
    assert!(matches!(err, RemoteStoreError::Command { command: "RENAME", .. }));
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_user_hash_lifecycle() {
    let utils = facade();

    for id in 1..=3 {
        let key = utils.redis_key_with_id(CacheKey::UserInfo, id).unwrap();
        assert_eq!(utils.hset(&key, "userId", id).await.unwrap(), 1);
        assert_eq!(utils.hset(&key, "userId", id).await.unwrap(), 0);
        assert_eq!(utils.hget(&key, "userId").await.unwrap(), Some(id.to_string()));
    }

    let pattern = utils.redis_key_pattern(CacheKey::UserInfo);
    assert_eq!(utils.hdel_all_matching(&pattern).await.unwrap(), 3);
    assert!(utils.keys(&pattern).await.unwrap().is_empty());

    cleanup(&utils).await;
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_ranking() {
    let utils = facade();
    let key = utils.redis_key(CacheKey::ArticleRanking);

    utils.zadd(&key, 10.0, "first").await.unwrap();
    utils.zadd(&key, 30.0, "third").await.unwrap();
    utils.zadd(&key, 20.0, "second").await.unwrap();

    assert_eq!(utils.zrevrange(&key, 0, 0).await.unwrap(), vec!["third"]);
    assert_eq!(utils.zrange(&key, 0, -1).await.unwrap(), vec!["first", "second", "third"]);
    assert_eq!(utils.zremrangebyrank(&key, 0, 1).await.unwrap(), 2);

    cleanup(&utils).await;
}

#[tokio::test]
#[ignore] // Requires Redis server
async fn test_delete_all_matching() {
    let utils = facade();

    for id in 1..=3 {
        let key = utils.redis_key_with_id(CacheKey::UserInfo, id).unwrap();
        utils.set(&key, id).await.unwrap();
    }
    let online = utils.redis_key(CacheKey::OnlineUsers);
    utils.sadd(&online, &[1, 2]).await.unwrap();

    let pattern = utils.redis_key_pattern(CacheKey::UserInfo);
    assert_eq!(utils.delete_all_matching(&pattern).await.unwrap(), 3);
    assert!(utils.exists(&online).await.unwrap());

    cleanup(&utils).await;
}
