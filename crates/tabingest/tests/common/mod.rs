//! Shared test utilities for tabingest integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs with their own root, uploads and store
//! - `RecordingSink` capturing the report stream
//! - Builders for configurations and archive fixtures

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::{RecordedEvent, RecordingSink, TestHarness};
