//! Lifecycle of the socket responder and the file writer

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tokenkeeper_domain::{KeeperError, ListenerKind, Result};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::token::TokenManager;

/// Starts and stops the token outputs provided by the token manager.
///
/// At most one output of each kind runs at a time.
pub struct ListenerManager {
    manager: Arc<dyn TokenManager>,
    running: Mutex<HashSet<ListenerKind>>,
}

impl ListenerManager {
    pub fn new(manager: Arc<dyn TokenManager>) -> Self {
        Self { manager, running: Mutex::new(HashSet::new()) }
    }

    /// Start the output of `kind` serving `target`.
    ///
    /// # Errors
    /// - `Configuration` if an output of this kind is already running
    /// - whatever the token manager reports when the output cannot start
    pub async fn start(&self, kind: ListenerKind, target: &Path) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.contains(&kind) {
            return Err(KeeperError::Configuration(format!("{kind} listener already started")));
        }

        match kind {
            ListenerKind::Socket => self.manager.start_socket_listener(target).await?,
            ListenerKind::File => self.manager.start_file_writer(target).await?,
        }
        running.insert(kind);
        info!(event = "listener.started", %kind, target = %target.display());
        Ok(())
    }

    /// Stop the output of `kind`. Stopping one that is not running is a
    /// no-op.
    pub async fn stop(&self, kind: ListenerKind) {
        let mut running = self.running.lock().await;
        if !running.remove(&kind) {
            debug!(event = "listener.stop_skipped", %kind, "listener not running");
            return;
        }

        match kind {
            ListenerKind::Socket => self.manager.stop_socket_listener().await,
            ListenerKind::File => self.manager.stop_file_writer().await,
        }
        info!(event = "listener.stopped", %kind);
    }

    /// Stop the file writer, then the socket responder.
    pub async fn stop_all(&self) {
        self.stop(ListenerKind::File).await;
        self.stop(ListenerKind::Socket).await;
    }
}
