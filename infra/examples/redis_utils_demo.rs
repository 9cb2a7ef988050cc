//! Example: caching user profiles with the pooled Redis facade
//!
//! Loads configuration (`config/*.toml`, `.env`, `CACHEKIT__*` and `REDIS_*`
//! variables), stores a few user hashes, reads one back and removes them
//! all with a pattern delete.
//!
//! Run with: cargo run --example redis_utils_demo -p ck_infra

use ck_core::cache::{online_users_key, user_info_key, CacheKey};
use ck_infra::RemoteStoreError;

#[tokio::main]
async fn main() -> Result<(), RemoteStoreError> {
    let utils = ck_infra::initialize()?;

    println!("=== Redis Utils Demo ===\n");
    println!("{}", utils.pool().statistics());

    if !utils.pool().health_check().await? {
        println!("Redis did not answer PING as expected");
        return Ok(());
    }
    println!("✓ Redis connected\n");

    let ns = utils.namespace().clone();
    for (id, name) in [(1, "alice"), (2, "bob"), (3, "carol")] {
        let key = user_info_key(&ns, id);
        utils.hset(&key, "userId", id).await?;
        utils.hset(&key, "name", name).await?;
        utils.sadd(&online_users_key(&ns), &[id]).await?;
    }
    println!("Stored 3 users under {}", utils.redis_key_pattern(CacheKey::UserInfo));

    let profile = utils.hgetall(&user_info_key(&ns, 2)).await?;
    println!("User 2: {:?}", profile);

    if let Some(member) = utils.srandmember(&online_users_key(&ns)).await? {
        println!("Random online user: {}", member);
    }

    let removed = utils
        .hdel_all_matching(&utils.redis_key_pattern(CacheKey::UserInfo))
        .await?;
    println!("Removed {} profile fields", removed);

    utils.del(&online_users_key(&ns)).await?;
    println!("\n{}", utils.pool().statistics());

    Ok(())
}
