//! Test doubles for the core ports
//!
//! Compiled for this crate's tests and, with the `test-utils` feature, for
//! other crates' tests.

pub mod mocks;

pub use mocks::{token_expiring_in, MockTokenManager, RecordingEcho};
