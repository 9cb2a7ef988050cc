//! Business key tags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical business key. The tag becomes the middle segment of every cache key,
/// e.g. `APP_USER_INFO::42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheKey {
    /// Cached user profile, keyed by user id
    UserInfo,
    /// Session token of a user, keyed by user id
    UserToken,
    /// Cached article body, keyed by article id
    ArticleInfo,
    /// View counter of an article, keyed by article id
    ArticleViews,
    /// Sorted set ranking articles by score
    ArticleRanking,
    /// Set of users currently online
    OnlineUsers,
}

impl CacheKey {
    /// Every tag, in declaration order
    pub const ALL: [CacheKey; 6] = [
        CacheKey::UserInfo,
        CacheKey::UserToken,
        CacheKey::ArticleInfo,
        CacheKey::ArticleViews,
        CacheKey::ArticleRanking,
        CacheKey::OnlineUsers,
    ];

    /// Upper-case identifier used inside keys
    pub fn tag(&self) -> &'static str {
        match self {
            CacheKey::UserInfo => "USER_INFO",
            CacheKey::UserToken => "USER_TOKEN",
            CacheKey::ArticleInfo => "ARTICLE_INFO",
            CacheKey::ArticleViews => "ARTICLE_VIEWS",
            CacheKey::ArticleRanking => "ARTICLE_RANKING",
            CacheKey::OnlineUsers => "ONLINE_USERS",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
