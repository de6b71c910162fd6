//! Token output listeners

pub mod service;

pub use service::ListenerManager;
