//! Error types used throughout tokenkeeper

use thiserror::Error;

/// Main error type for tokenkeeper
///
/// Every variant is fatal for the daemon: the binary reports it on stderr and
/// exits with status 1. Nothing is retried.
#[derive(Error, Debug)]
pub enum KeeperError {
    /// Cyclic or unresolved provider inheritance, missing client id, session
    /// file already present without `--force`, duplicate listener start.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A token was expected but none is held.
    #[error("No token available: {0}")]
    NoToken(String),

    /// The session store could not be opened or decrypted.
    #[error("Cannot open session: {0}")]
    SessionDecryption(String),

    /// The pidfile lock is held by another process.
    #[error("{message}")]
    Lock { pid: Option<u32>, message: String },

    /// The token endpoint rejected a request or could not be reached.
    #[error("OAuth protocol error: {0}")]
    Protocol(String),

    /// A log, session, socket or output file could not be used.
    #[error("I/O error: {0}")]
    Io(String),
}

impl KeeperError {
    /// Lock error for a pidfile owned by `pid` (if it could be read).
    #[must_use]
    pub fn already_running(pid: Option<u32>, path: &std::path::Path) -> Self {
        let message = match pid {
            Some(pid) => format!("already running (pid {pid}, pidfile {})", path.display()),
            None => format!("already running (pidfile {} is locked)", path.display()),
        };
        Self::Lock { pid, message }
    }

    /// Wrap an I/O error with a short description of what was being done.
    #[must_use]
    pub fn io(context: impl std::fmt::Display, err: &std::io::Error) -> Self {
        Self::Io(format!("{context}: {err}"))
    }

    /// Process exit status for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        1
    }
}

/// Result type alias for tokenkeeper operations
pub type Result<T> = std::result::Result<T, KeeperError>;
