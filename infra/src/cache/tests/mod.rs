#[cfg(feature = "mock-services")]
mod memory_tests;
