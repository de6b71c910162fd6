//! Daemon lifecycle policy
//!
//! The mechanics (pidfile locking, detaching, signal delivery) live in
//! `tokenkeeper-infra`; this module decides what a signal means and gives
//! the shutdown a single dispatch point.

pub mod policy;
pub mod shutdown;

pub use policy::{signal_disposition, ShutdownIntent, ShutdownSignal, SignalDisposition};
pub use shutdown::ShutdownController;
