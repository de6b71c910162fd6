//! Token outputs: the Unix-socket responder and the file writer
//!
//! Both read the token through a [`TokenCell`](tokenkeeper_core::TokenCell)
//! subscription and run as tasks on the service runtime until stopped.

pub mod file_writer;
pub mod socket;

use std::path::PathBuf;

use tokenkeeper_domain::ListenerKind;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub use file_writer::spawn_file_writer;
pub use socket::spawn_socket_responder;

/// A running output task
#[derive(Debug)]
pub struct ListenerTask {
    kind: ListenerKind,
    path: PathBuf,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ListenerTask {
    pub(crate) fn new(
        kind: ListenerKind,
        path: PathBuf,
        cancel: CancellationToken,
        handle: JoinHandle<()>,
    ) -> Self {
        Self { kind, path, cancel, handle }
    }

    /// Cancel the task and wait for it to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            warn!(event = "listener.task_failed", kind = %self.kind, error = %err);
        }

        if self.kind == ListenerKind::Socket {
            if let Err(err) = crate::fs::remove_if_exists(&self.path) {
                warn!(event = "listener.socket_cleanup_failed", path = %self.path.display(), error = %err);
            }
        }
        debug!(event = "listener.task_stopped", kind = %self.kind, path = %self.path.display());
    }
}
