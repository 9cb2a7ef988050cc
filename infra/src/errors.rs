//! Infrastructure error types
//!
//! Every failure of the pool or the command facade collapses into
//! [`RemoteStoreError`]. Messages are bilingual (English | Chinese).

use ck_core::errors::KeyError;
use redis::RedisError;
use thiserror::Error;
use tracing::error;

/// Errors raised by the connection pool and the command facade
#[derive(Debug, Error)]
pub enum RemoteStoreError {
    /// No connection became available within the configured wait
    #[error("Connection pool exhausted after waiting {waited_ms}ms | 连接池已耗尽，已等待 {waited_ms} 毫秒")]
    PoolExhausted { waited_ms: u64 },

    /// The pool could not open or validate a connection
    #[error("Redis connection failed: {source} | Redis连接失败: {source}")]
    Connection { source: RedisError },

    /// A command reached Redis (or tried to) and failed
    #[error("Redis command {command} failed for key '{key}': {source} | Redis服务异常：{command} {key}")]
    Command {
        command: &'static str,
        key: String,
        source: RedisError,
    },

    /// A value could not be encoded to or decoded from JSON
    #[error("Value serialization failed: {0} | 值序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key building rejected its input
    #[error("Invalid argument: {0} | 参数无效: {0}")]
    InvalidArgument(String),

    /// Connection or pool settings are unusable
    #[error("Configuration error: {0} | 配置错误: {0}")]
    Config(String),
}

impl RemoteStoreError {
    /// Wrap a failed command, logging it
    pub fn command(command: &'static str, key: impl Into<String>, source: RedisError) -> Self {
        let key = key.into();
        error!("Redis command {} failed for key '{}': {}", command, key, source);
        Self::Command {
            command,
            key,
            source,
        }
    }

    /// The Redis error behind this failure, if any
    pub fn redis_error(&self) -> Option<&RedisError> {
        match self {
            Self::Connection { source } | Self::Command { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether the failure came from waiting on the pool
    pub fn is_pool_exhausted(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }
}

impl From<KeyError> for RemoteStoreError {
    fn from(err: KeyError) -> Self {
        match err {
            KeyError::InvalidArgument { message } => Self::InvalidArgument(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, RemoteStoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use redis::ErrorKind;

    #[test]
    fn test_command_error_message() {
        let source = RedisError::from((ErrorKind::ResponseError, "ERR", "no such key".to_string()));
        let err = RemoteStoreError::command("RENAME", "USER::1", source);
        let message = err.to_string();

        assert!(message.contains("RENAME"));
        assert!(message.contains("USER::1"));
        assert!(message.contains("Redis服务异常"));
        assert_eq!(err.redis_error().map(|e| e.kind()), Some(ErrorKind::ResponseError));
    }

    #[test]
    fn test_pool_exhausted_message() {
        let err = RemoteStoreError::PoolExhausted { waited_ms: 50 };
        assert!(err.is_pool_exhausted());
        assert!(err.to_string().contains("50ms"));
        assert!(err.to_string().contains("连接池已耗尽"));
        assert!(err.redis_error().is_none());
    }

    #[test]
    fn test_from_key_error() {
        let err: RemoteStoreError = KeyError::invalid_argument("id must not be empty").into();
        match err {
            RemoteStoreError::InvalidArgument(message) => {
                assert_eq!(message, "id must not be empty")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_from_serde_error() {
        let source = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: RemoteStoreError = source.into();
        assert!(matches!(err, RemoteStoreError::Serialization(_)));
    }
}
