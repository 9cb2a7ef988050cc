//! Integration tests for the command facade over the in-memory store
//!
//! These run the real pool and facade without a Redis server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ck_core::cache::{article_views_key, user_info_key};
use ck_infra::cache::{CacheKey, MemoryStore, PoolConfig, RedisUtils};
use ck_infra::RemoteStoreError;
use ck_shared::config::AppConfig;

fn pool_config() -> PoolConfig {
    PoolConfig::new(4, Duration::from_secs(1))
}

#[tokio::test]
async fn test_user_keys_batch_deletion() {
    let utils = RedisUtils::in_memory("APP", &pool_config()).unwrap();

    for id in 1..=3 {
        utils.set(&format!("USER::{}", id), id).await.unwrap();
    }

    assert_eq!(utils.delete_all_matching("USER::*").await.unwrap(), 3);
    assert!(!utils.exists("USER::1").await.unwrap());
}

#[tokio::test]
async fn test_user_info_hash() -> anyhow::Result<()> {
    let utils = RedisUtils::in_memory("PJB", &pool_config())?;
    let key = utils.redis_key_with_id(CacheKey::UserInfo, 1)?;

    assert_eq!(utils.hset(&key, "userId", "1").await?, 1);
    assert_eq!(utils.hset(&key, "userId", "1").await?, 0);
    assert_eq!(utils.hget(&key, "userId").await?, Some("1".to_string()));
    Ok(())
}

#[tokio::test]
async fn test_typed_keys_match_facade_keys() {
    let utils = RedisUtils::in_memory("PJB", &pool_config()).unwrap();

    assert_eq!(
        user_info_key(utils.namespace(), 9),
        utils.redis_key_with_id(CacheKey::UserInfo, 9).unwrap()
    );
    assert_eq!(
        article_views_key(utils.namespace(), 3),
        utils.redis_key_with_id(CacheKey::ArticleViews, 3).unwrap()
    );
}

#[tokio::test]
async fn test_pattern_deletion_counts_only_matching_keys() {
    let utils = RedisUtils::in_memory("PJB", &pool_config()).unwrap();
    let ns = utils.namespace().clone();

    for id in 0..25 {
        utils.set(&user_info_key(&ns, id), id).await.unwrap();
        utils.incr(&article_views_key(&ns, id)).await.unwrap();
    }

    let pattern = utils.redis_key_pattern(CacheKey::UserInfo);
    assert_eq!(utils.delete_all_matching(&pattern).await.unwrap(), 25);

    let views = utils.redis_key_pattern(CacheKey::ArticleViews);
    assert_eq!(utils.keys(&views).await.unwrap().len(), 25);
}

#[tokio::test]
async fn test_excess_caller_fails_after_max_wait() {
    let utils = RedisUtils::in_memory("APP", &PoolConfig::new(1, Duration::from_millis(50))).unwrap();

    let held = utils.pool().acquire().await.unwrap();
    let started = Instant::now();
    let err = utils.get("k").await.unwrap_err();

    assert!(matches!(err, RemoteStoreError::PoolExhausted { .. }));
    assert!(started.elapsed() >= Duration::from_millis(45));
    drop(held);

    assert_eq!(utils.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn test_concurrent_callers_share_the_pool() {
    let store = MemoryStore::new();
    let utils = Arc::new(
        RedisUtils::in_memory_with_store(store.clone(), "APP", &PoolConfig::new(2, Duration::from_secs(2)))
            .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..20 {
        let utils = Arc::clone(&utils);
        handles.push(tokio::spawn(async move { utils.incr("hits").await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(utils.get("hits").await.unwrap(), Some("20".to_string()));
    let stats = utils.pool().statistics();
    assert!(stats.connections <= 2);
    assert_eq!(stats.idle_connections, stats.connections);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_initialize_with_default_config() {
    // the pool connects lazily, so no server is needed to build it
    let utils = ck_infra::initialize_with(&AppConfig::default()).unwrap();
    assert_eq!(utils.namespace().as_str(), "APP");
    assert_eq!(utils.pool().statistics().max_connections, 8);
}

#[tokio::test]
async fn test_initialize_with_invalid_config() {
    let config = AppConfig::from_toml(
        r#"
        [redis]
        namespace = ""
        "#,
    )
    .unwrap();

    let result = ck_infra::initialize_with(&config);
    assert!(matches!(result, Err(RemoteStoreError::Config(_))));
}
