//! Shared test utilities for minutewatch integration tests.
//!
//! This module provides:
//! - `TestHarness`: an engine over a temp directory, an in-memory store and
//!   an in-memory fetcher
//! - helpers for publishing source pages and generated PDFs

pub mod harness;

pub use harness::TestHarness;
