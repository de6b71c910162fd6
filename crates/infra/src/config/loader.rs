//! Configuration loader
//!
//! Loads the daemon configuration from a file, then applies environment
//! overrides.
//!
//! ## Loading Strategy
//! 1. An explicit path (`--config`) must exist
//! 2. Otherwise `TOKENKEEPER_CONFIG`, if set, must exist
//! 3. Otherwise the standard locations are probed; none found means defaults
//! 4. JSON and TOML are supported, detected by file extension
//!
//! ## Environment Variables
//! - `TOKENKEEPER_CONFIG`: Configuration file path
//! - `TOKENKEEPER_REFRESH_THRESHOLD`: Refresh threshold in seconds
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./tokenkeeper.toml` or `./tokenkeeper.json` (current working directory)
//! 2. `$XDG_CONFIG_HOME/tokenkeeper/config.{toml,json}`
//! 3. `$HOME/.config/tokenkeeper/config.{toml,json}`

use std::path::{Path, PathBuf};

use tokenkeeper_domain::constants::{
    ENV_CONFIG_PATH, ENV_REFRESH_THRESHOLD, MAX_REFRESH_THRESHOLD_SECS,
};
use tokenkeeper_domain::{KeeperConfig, KeeperError, Result};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `KeeperError::Configuration` if:
/// - An explicitly named file (argument or `TOKENKEEPER_CONFIG`) is missing
/// - File format is invalid
/// - An environment override has an invalid value
/// - The refresh threshold is negative or above one week
pub fn load(explicit: Option<&Path>) -> Result<KeeperConfig> {
    let named = explicit.map(Path::to_path_buf).or_else(|| env_path(ENV_CONFIG_PATH));

    let mut config = match named {
        Some(path) => load_from_file(&path)?,
        None => match probe_config_paths() {
            Some(path) => load_from_file(&path)?,
            None => {
                tracing::debug!(event = "config.defaults", "no configuration file found, using defaults");
                KeeperConfig::default()
            }
        },
    };

    apply_env_overrides(&mut config)?;
    check_threshold(config.refresh_threshold_seconds)?;
    Ok(config)
}

fn check_threshold(seconds: i64) -> Result<()> {
    if (0..=MAX_REFRESH_THRESHOLD_SECS).contains(&seconds) {
        return Ok(());
    }
    Err(KeeperError::Configuration(format!(
        "refresh threshold {seconds}s is outside 0..={MAX_REFRESH_THRESHOLD_SECS}"
    )))
}

/// Load configuration from a file
///
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `KeeperError::Configuration` if the file is missing, unreadable,
/// or not valid for its format.
pub fn load_from_file(path: &Path) -> Result<KeeperConfig> {
    if !path.exists() {
        return Err(KeeperError::Configuration(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    tracing::info!(event = "config.loading", path = %path.display());

    let contents = std::fs::read_to_string(path)
        .map_err(|e| KeeperError::Configuration(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`; anything else
/// is read as TOML).
fn parse_config(contents: &str, path: &Path) -> Result<KeeperConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "json" => serde_json::from_str(contents)
            .map_err(|e| KeeperError::Configuration(format!("Invalid JSON format: {}", e))),
        "toml" => toml::from_str(contents)
            .map_err(|e| KeeperError::Configuration(format!("Invalid TOML format: {}", e))),
        _ => Err(KeeperError::Configuration(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    candidate_paths().into_iter().find(|path| path.is_file())
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend([cwd.join("tokenkeeper.toml"), cwd.join("tokenkeeper.json")]);
    }

    let config_dirs = [
        env_path("XDG_CONFIG_HOME"),
        env_path("HOME").map(|home| home.join(".config")),
    ];
    for dir in config_dirs.into_iter().flatten() {
        let dir = dir.join("tokenkeeper");
        candidates.extend([dir.join("config.toml"), dir.join("config.json")]);
    }

    candidates
}

fn apply_env_overrides(config: &mut KeeperConfig) -> Result<()> {
    if let Ok(raw) = std::env::var(ENV_REFRESH_THRESHOLD) {
        config.refresh_threshold_seconds = raw.trim().parse::<i64>().map_err(|e| {
            KeeperError::Configuration(format!("Invalid {ENV_REFRESH_THRESHOLD}: {e}"))
        })?;
    }
    Ok(())
}

/// Non-empty environment variable as a path
fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var_os(key).filter(|value| !value.is_empty()).map(PathBuf::from)
}
