//! Common test utilities for bulk-media-download integration tests

#[allow(dead_code)]
pub mod fixtures;

pub use fixtures::*;
