//! Shared test utilities for picscribe integration tests.
//!
//! This module provides:
//! - `TestHarness` for isolated runs over a temp directory with an in-memory store
//! - `FakeBackend`, a scripted stand-in for the vision endpoint

pub mod fakes;
pub mod harness;

pub use fakes::FakeBackend;
pub use harness::TestHarness;
