//! Project-prefixed cache keys.
//!
//! Layout: `{namespace}_{tag}` for singleton keys and
//! `{namespace}_{tag}::{id}` for keys carrying an identifier.

use std::fmt;

use super::tags::CacheKey;
use crate::errors::{KeyError, KeyResult};

/// Separator between namespace and tag
pub const TAG_SEPARATOR: &str = "_";

/// Separator between tag and identifier
pub const ID_SEPARATOR: &str = "::";

const GLOB_META: &[char] = &['*', '?', '[', ']', '\\'];

/// Project namespace prefixed to every cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyNamespace {
    prefix: String,
}

impl KeyNamespace {
    /// Create a namespace.
    ///
    /// Rejects an empty prefix, one containing `::`, and one containing glob
    /// metacharacters (which would make [`KeyNamespace::pattern`] match
    /// foreign keys).
    pub fn new(prefix: impl Into<String>) -> KeyResult<Self> {
        let prefix = prefix.into();

        if prefix.is_empty() {
            return Err(KeyError::invalid_argument("namespace must not be empty"));
        }
        if prefix.contains(ID_SEPARATOR) {
            return Err(KeyError::invalid_argument(format!(
                "namespace '{}' must not contain '{}'",
                prefix, ID_SEPARATOR
            )));
        }
        if prefix.contains(GLOB_META) {
            return Err(KeyError::invalid_argument(format!(
                "namespace '{}' must not contain glob characters",
                prefix
            )));
        }

        Ok(Self { prefix })
    }

    pub fn as_str(&self) -> &str {
        &self.prefix
    }

    /// Key without identifier: `{namespace}_{tag}`
    pub fn key(&self, tag: CacheKey) -> String {
        format!("{}{}{}", self.prefix, TAG_SEPARATOR, tag)
    }

    /// Key with identifier: `{namespace}_{tag}::{id}`.
    ///
    /// Fails with `InvalidArgument` when `id` renders to an empty string.
    pub fn key_with_id(&self, tag: CacheKey, id: impl fmt::Display) -> KeyResult<String> {
        let id = id.to_string();
        if id.is_empty() {
            return Err(KeyError::invalid_argument(format!(
                "id for cache key {} must not be empty",
                tag
            )));
        }
        Ok(self.compose(tag, &id))
    }

    /// Pattern matching every identifier of a tag: `{namespace}_{tag}::*`
    pub fn pattern(&self, tag: CacheKey) -> String {
        self.compose(tag, "*")
    }

    fn compose(&self, tag: CacheKey, id: &str) -> String {
        format!("{}{}{}", self.key(tag), ID_SEPARATOR, id)
    }
}

impl fmt::Display for KeyNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)
    }
}

impl Default for KeyNamespace {
    fn default() -> Self {
        Self {
            prefix: String::from("APP"),
        }
    }
}

/// Returns the cache key for a user's profile.
pub fn user_info_key(namespace: &KeyNamespace, user_id: u64) -> String {
    namespace.compose(CacheKey::UserInfo, &user_id.to_string())
}

/// Returns the cache key for a user's session token.
pub fn user_token_key(namespace: &KeyNamespace, user_id: u64) -> String {
    namespace.compose(CacheKey::UserToken, &user_id.to_string())
}

/// Returns the cache key for an article body.
pub fn article_info_key(namespace: &KeyNamespace, article_id: u64) -> String {
    namespace.compose(CacheKey::ArticleInfo, &article_id.to_string())
}

/// Returns the cache key for an article's view counter.
pub fn article_views_key(namespace: &KeyNamespace, article_id: u64) -> String {
    namespace.compose(CacheKey::ArticleViews, &article_id.to_string())
}

/// Returns the sorted-set key ranking all articles.
pub fn article_ranking_key(namespace: &KeyNamespace) -> String {
    namespace.key(CacheKey::ArticleRanking)
}

/// Returns the set key holding online users.
pub fn online_users_key(namespace: &KeyNamespace) -> String {
    namespace.key(CacheKey::OnlineUsers)
}
