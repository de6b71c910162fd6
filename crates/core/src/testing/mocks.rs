//! Mock implementations of the core ports

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokenkeeper_common::auth::TokenSet;
use tokenkeeper_domain::{KeeperError, Result};
use tokio_util::sync::CancellationToken;

use crate::token::{TokenCell, TokenEcho, TokenManager};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Build a token that expires `lifetime_secs` from now.
#[must_use]
pub fn token_expiring_in(access_token: &str, lifetime_secs: i64) -> TokenSet {
    TokenSet::new(
        access_token.to_string(),
        Some("refresh".to_string()),
        None,
        lifetime_secs,
        None,
    )
}

/// In-memory token manager that records every call.
///
/// Each refresh issues `access-N` (N counting from 1) with the configured
/// lifetime. Calls are logged in order as `refresh`, `save`,
/// `start_socket:<path>`, `stop_socket`, `start_file:<path>`, `stop_file`.
#[derive(Debug)]
pub struct MockTokenManager {
    cell: TokenCell,
    lifetime_secs: i64,
    refreshes: AtomicUsize,
    saves: AtomicUsize,
    calls: Mutex<Vec<String>>,
    fail_refresh: Mutex<bool>,
    fail_save: Mutex<bool>,
    fail_socket_start: Mutex<bool>,
    fail_file_start: Mutex<bool>,
    drop_token_on_refresh: Mutex<bool>,
    cancel_after: Mutex<Option<(usize, CancellationToken)>>,
    socket_path: Mutex<Option<PathBuf>>,
    file_path: Mutex<Option<PathBuf>>,
}

impl MockTokenManager {
    /// Create a manager holding `initial`; refreshed tokens live
    /// `lifetime_secs`.
    #[must_use]
    pub fn new(initial: Option<TokenSet>, lifetime_secs: i64) -> Self {
        Self {
            cell: TokenCell::new(initial),
            lifetime_secs,
            refreshes: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
            fail_refresh: Mutex::new(false),
            fail_save: Mutex::new(false),
            fail_socket_start: Mutex::new(false),
            fail_file_start: Mutex::new(false),
            drop_token_on_refresh: Mutex::new(false),
            cancel_after: Mutex::new(None),
            socket_path: Mutex::new(None),
            file_path: Mutex::new(None),
        }
    }

    /// Make `refresh_token` fail with a protocol error.
    pub fn set_fail_refresh(&self, fail: bool) {
        *lock(&self.fail_refresh) = fail;
    }

    /// Make `save_session` fail with an I/O error.
    pub fn set_fail_save(&self, fail: bool) {
        *lock(&self.fail_save) = fail;
    }

    /// Make `start_socket_listener` fail.
    pub fn set_fail_socket_start(&self, fail: bool) {
        *lock(&self.fail_socket_start) = fail;
    }

    /// Make `start_file_writer` fail.
    pub fn set_fail_file_start(&self, fail: bool) {
        *lock(&self.fail_file_start) = fail;
    }

    /// Report refresh success while leaving no token behind.
    pub fn set_drop_token_on_refresh(&self, drop_token: bool) {
        *lock(&self.drop_token_on_refresh) = drop_token;
    }

    /// Cancel `token` once `refreshes` refreshes have completed.
    pub fn cancel_after(&self, refreshes: usize, token: CancellationToken) {
        *lock(&self.cancel_after) = Some((refreshes, token));
    }

    /// Number of completed refreshes
    #[must_use]
    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Number of completed saves
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Ordered call log
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Whether the socket responder is running
    #[must_use]
    pub fn socket_running(&self) -> bool {
        lock(&self.socket_path).is_some()
    }

    /// Whether the file writer is running
    #[must_use]
    pub fn file_running(&self) -> bool {
        lock(&self.file_path).is_some()
    }

    fn record(&self, call: impl Into<String>) {
        lock(&self.calls).push(call.into());
    }
}

#[async_trait]
impl TokenManager for MockTokenManager {
    fn token(&self) -> Option<Arc<TokenSet>> {
        if *lock(&self.drop_token_on_refresh) && self.refresh_count() > 0 {
            return None;
        }
        self.cell.get()
    }

    async fn refresh_token(&self) -> Result<()> {
        self.record("refresh");
        if *lock(&self.fail_refresh) {
            return Err(KeeperError::Protocol("invalid_grant".to_string()));
        }

        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        self.cell.replace(token_expiring_in(&format!("access-{n}"), self.lifetime_secs));

        if let Some((after, token)) = lock(&self.cancel_after).as_ref() {
            if n >= *after {
                token.cancel();
            }
        }
        Ok(())
    }

    async fn save_session(&self) -> Result<()> {
        self.record("save");
        if *lock(&self.fail_save) {
            return Err(KeeperError::Io("session file is read-only".to_string()));
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn start_socket_listener(&self, path: &Path) -> Result<()> {
        self.record(format!("start_socket:{}", path.display()));
        if *lock(&self.fail_socket_start) {
            return Err(KeeperError::Io(format!("cannot bind {}", path.display())));
        }
        *lock(&self.socket_path) = Some(path.to_path_buf());
        Ok(())
    }

    async fn stop_socket_listener(&self) {
        self.record("stop_socket");
        lock(&self.socket_path).take();
    }

    async fn start_file_writer(&self, path: &Path) -> Result<()> {
        self.record(format!("start_file:{}", path.display()));
        if *lock(&self.fail_file_start) {
            return Err(KeeperError::Io(format!("cannot write {}", path.display())));
        }
        *lock(&self.file_path) = Some(path.to_path_buf());
        Ok(())
    }

    async fn stop_file_writer(&self) {
        self.record("stop_file");
        lock(&self.file_path).take();
    }
}

/// Echo that collects tokens instead of printing them
#[derive(Debug, Default)]
pub struct RecordingEcho {
    echoed: Mutex<Vec<String>>,
}

impl RecordingEcho {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokens echoed so far
    #[must_use]
    pub fn echoed(&self) -> Vec<String> {
        lock(&self.echoed).clone()
    }
}

impl TokenEcho for RecordingEcho {
    fn echo(&self, access_token: &str) {
        lock(&self.echoed).push(access_token.to_string());
    }
}
