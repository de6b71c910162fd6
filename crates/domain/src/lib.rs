//! # tokenkeeper Domain
//!
//! Domain types shared by every tokenkeeper crate.
//!
//! This crate contains:
//! - Provider registration records
//! - The error taxonomy and Result alias
//! - Configuration structures
//! - Defaults and environment variable names
//!
//! ## Architecture
//! - No dependencies on other tokenkeeper crates
//! - Pure data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
