//! Shared test utilities for prodex integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated test execution with temp directories
//! - Stub extraction operations and a config builder

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
