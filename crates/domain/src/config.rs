//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_CALLBACK_PORT, DEFAULT_REFRESH_THRESHOLD_SECS};
use crate::types::ProviderRegistration;

/// Daemon configuration loaded from `tokenkeeper.toml` (or JSON)
///
/// Command-line flags override these values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// Refresh this many seconds before the access token expires
    #[serde(default = "default_threshold")]
    pub refresh_threshold_seconds: i64,

    /// Port for the authorization redirect listener
    #[serde(default)]
    pub callback_port: u16,

    /// Additional or replacement provider registrations
    #[serde(default)]
    pub providers: Vec<ProviderRegistration>,
}

fn default_threshold() -> i64 {
    DEFAULT_REFRESH_THRESHOLD_SECS
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            refresh_threshold_seconds: DEFAULT_REFRESH_THRESHOLD_SECS,
            callback_port: DEFAULT_CALLBACK_PORT,
            providers: Vec::new(),
        }
    }
}
