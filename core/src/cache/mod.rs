//! Cache key derivation and matching.
//!
//! - `tags` - closed set of business key tags
//! - `namespace` - project-prefixed key layout and typed key constructors
//! - `key_type` - the type of a stored key as reported by Redis
//! - `patterns` - Redis glob matching against keys

pub mod key_type;
pub mod namespace;
pub mod patterns;
pub mod tags;

pub use key_type::KeyType;
pub use namespace::{
    article_info_key, article_ranking_key, article_views_key, online_users_key,
    user_info_key, user_token_key, KeyNamespace, ID_SEPARATOR, TAG_SEPARATOR,
};
pub use patterns::pattern_matches;
pub use tags::CacheKey;
