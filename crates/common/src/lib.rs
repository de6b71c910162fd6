//! Modular common utilities shared across tokenkeeper crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: errors
//! - `runtime`: symmetric encryption with password-derived keys
//! - `platform`: OAuth 2.0 + PKCE client
//! - `observability`: optional tracing (pulled in by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod crypto;

// Platform tier
// -------------------------------------------------------------------
#[cfg(feature = "platform")]
pub mod auth;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use crypto::{EncryptedData, EncryptionService as SymmetricEncryptionService};
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult};
