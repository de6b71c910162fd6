//! Application constants
//!
//! Centralized location for the defaults shared by the daemon crates.

/// Seconds before expiry at which the access token is refreshed
pub const DEFAULT_REFRESH_THRESHOLD_SECS: i64 = 300;

/// Largest accepted refresh threshold (one week)
pub const MAX_REFRESH_THRESHOLD_SECS: i64 = 7 * 24 * 60 * 60;

/// Callback port for the authorization redirect listener (0 = any free port)
pub const DEFAULT_CALLBACK_PORT: u16 = 0;

/// Minimum length of a new session password
pub const MIN_SESSION_PASSWORD_LEN: usize = 10;

/// Password attempts before an existing session is given up on
pub const SESSION_UNLOCK_ATTEMPTS: usize = 3;

/// Largest request the token socket reads before answering
pub const MAX_SOCKET_REQUEST_BYTES: usize = 8 * 1024;

// Environment variables
pub const ENV_CONFIG_PATH: &str = "TOKENKEEPER_CONFIG";
pub const ENV_REFRESH_THRESHOLD: &str = "TOKENKEEPER_REFRESH_THRESHOLD";
pub const ENV_SESSION_PASSWORD: &str = "TOKENKEEPER_SESSION_PASSWORD";
