//! Token ownership: the manager port and the shared token cell

pub mod cell;
pub mod ports;

pub use cell::TokenCell;
pub use ports::{TokenEcho, TokenManager};
