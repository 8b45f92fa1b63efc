//! Shared test utilities for pitch-video integration tests.
//!
//! This module provides:
//! - Fake media tools and an in-memory object store (`fakes`)
//! - `TestHarness`, a job manager wired to those fakes in an isolated temp dir

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::TestHarness;
