//! # tokenkeeper Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - Configuration loading (TOML/JSON, environment overrides)
//! - The encrypted session store and the session-backed token manager
//! - Socket responder and file writer for the current token
//! - Authorization-code flow with a loopback callback listener
//! - Process control: pidfile lock, daemonization, signal delivery
//!
//! ## Architecture
//! - Implements traits defined in `tokenkeeper-core`
//! - Depends on `tokenkeeper-common`, `tokenkeeper-domain` and `tokenkeeper-core`
//! - Contains all "impure" code (I/O, sockets, processes)

pub mod authorize;
pub mod config;
pub mod daemon;
pub mod errors;
pub mod fs;
pub mod instance_lock;
pub mod listeners;
pub mod session_store;
pub mod signals;
pub mod token_manager;

// Re-export commonly used items
pub use authorize::{authorize_new_session, AuthorizationPrompt, CallbackServer};
pub use errors::InfraError;
pub use instance_lock::PidLock;
pub use session_store::{PasswordSource, Session, SessionStore};
pub use token_manager::SessionTokenManager;
