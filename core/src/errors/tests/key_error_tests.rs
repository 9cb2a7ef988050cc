//! Unit tests for key error types

use crate::errors::{extract_chinese_message, extract_english_message, KeyError};

#[test]
fn test_key_error_messages() {
    let error = KeyError::invalid_argument("id must not be empty");
    let message = error.to_string();
    assert!(message.contains("Invalid argument"));
    assert!(message.contains("参数无效"));
    assert!(message.contains("id must not be empty"));
}

#[test]
fn test_key_error_equality() {
    assert_eq!(
        KeyError::invalid_argument("x"),
        KeyError::InvalidArgument {
            message: "x".to_string()
        }
    );
}

#[test]
fn test_message_extraction() {
    let error = KeyError::invalid_argument("bad namespace");
    let message = error.to_string();
    assert_eq!(
        extract_english_message(&message),
        "Invalid argument: bad namespace"
    );
    assert_eq!(extract_chinese_message(&message), "参数无效: bad namespace");

    let english_only = "Only English";
    assert_eq!(extract_english_message(english_only), "Only English");
    assert_eq!(extract_chinese_message(english_only), "Only English");
}
