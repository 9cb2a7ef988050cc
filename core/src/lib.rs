//! # CacheKit Core
//!
//! Pure domain logic for the CacheKit workspace.
//! This crate derives cache keys from business tags and identifiers,
//! matches keys against Redis glob patterns, and defines the key errors.
//! Nothing in here performs I/O.

pub mod cache;
pub mod errors;

// Re-export commonly used types for convenience
pub use cache::*;
pub use errors::*;
