//! Shared test utilities for jobharvest integration tests.
//!
//! This module provides:
//! - `TestHarness` owning a temp directory and a file-backed job store
//! - Scripted in-process source adapters
//! - Builders for configs and postings

pub mod adapters;
pub mod builders;
pub mod harness;

pub use adapters::*;
pub use builders::*;
pub use harness::{poll_until, TestHarness};
