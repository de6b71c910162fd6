//! # tokenkeeper Core
//!
//! Orchestration logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - Provider registry and inheritance resolution
//! - Port interfaces for the token manager (traits)
//! - The refresh scheduler, listener lifecycle and shutdown policy
//!
//! ## Architecture Principles
//! - Only depends on `tokenkeeper-common` and `tokenkeeper-domain`
//! - No filesystem, HTTP, or process-control code
//! - All external dependencies via traits

pub mod lifecycle;
pub mod listeners;
pub mod orchestrator;
pub mod providers;
pub mod scheduler;
pub mod token;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export specific items to avoid ambiguity
pub use lifecycle::{
    signal_disposition, ShutdownController, ShutdownIntent, ShutdownSignal, SignalDisposition,
};
pub use listeners::ListenerManager;
pub use orchestrator::{Orchestrator, OrchestratorConfig, RunOutcome};
pub use providers::ProviderRegistry;
pub use scheduler::{should_echo, RefreshScheduler};
pub use token::{TokenCell, TokenEcho, TokenManager};
