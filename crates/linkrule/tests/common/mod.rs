//! Shared test utilities for linkrule integration tests.
//!
//! This module provides:
//! - `TestHarness` with temporary source/target trees and an in-memory database
//! - `RuleSpecBuilder` for assembling rule specs in tests

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::TestHarness;
