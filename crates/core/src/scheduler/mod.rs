//! Proactive token refresh scheduling

pub mod service;

pub use service::{should_echo, RefreshScheduler};
