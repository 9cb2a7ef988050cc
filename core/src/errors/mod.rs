//! Domain-specific error types and error handling.

use thiserror::Error;

/// Errors raised while deriving cache keys
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid argument: {message} | 参数无效: {message}")]
    InvalidArgument { message: String },
}

impl KeyError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

pub type KeyResult<T> = Result<T, KeyError>;

/// Extract the English part of a bilingual error message
pub fn extract_english_message(error_msg: &str) -> String {
    match error_msg.find(" | ") {
        Some(pipe_index) => error_msg[..pipe_index].to_string(),
        None => error_msg.to_string(),
    }
}

/// Extract the Chinese part of a bilingual error message
pub fn extract_chinese_message(error_msg: &str) -> String {
    match error_msg.find(" | ") {
        Some(pipe_index) => error_msg[pipe_index + 3..].to_string(),
        None => error_msg.to_string(),
    }
}

#[cfg(test)]
mod tests;
