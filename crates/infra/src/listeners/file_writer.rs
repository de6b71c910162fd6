//! Keeps a file holding the current access token
//!
//! The token is written without a trailing newline. A write is skipped when
//! the access token did not change.

use std::path::{Path, PathBuf};

use tokenkeeper_core::TokenCell;
use tokenkeeper_domain::{KeeperError, ListenerKind, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::ListenerTask;

/// Write the current token to `path` now, then again on every change.
///
/// The first write happens before this returns so an unwritable target is
/// reported as a start failure.
pub async fn spawn_file_writer(path: &Path, cell: TokenCell) -> Result<ListenerTask> {
    let mut receiver = cell.subscribe();
    let current = receiver.borrow_and_update().as_ref().map(|t| t.access_token.clone());

    let mut written = None;
    match current {
        Some(access_token) => {
            write_token(path.to_path_buf(), access_token.clone()).await?;
            written = Some(access_token);
        }
        None => warn!(event = "file_writer.no_token", path = %path.display()),
    }
    info!(event = "file_writer.started", path = %path.display());

    let cancel = CancellationToken::new();
    let task_cancel = cancel.clone();
    let target = path.to_path_buf();

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                changed = receiver.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let latest = receiver.borrow_and_update().as_ref().map(|t| t.access_token.clone());
                    let Some(access_token) = latest else { continue };
                    if written.as_ref() == Some(&access_token) {
                        continue;
                    }
                    match write_token(target.clone(), access_token.clone()).await {
                        Ok(()) => written = Some(access_token),
                        Err(err) => error!(event = "file_writer.write_failed", error = %err),
                    }
                }
                () = task_cancel.cancelled() => break,
            }
        }
    });

    Ok(ListenerTask::new(ListenerKind::File, path.to_path_buf(), cancel, handle))
}

async fn write_token(path: PathBuf, access_token: String) -> Result<()> {
    let shown = path.display().to_string();
    tokio::task::spawn_blocking(move || crate::fs::write_atomic(&path, access_token.as_bytes()))
        .await
        .map_err(|e| KeeperError::Io(format!("token writer for {shown} failed: {e}")))?
        .map_err(|e| KeeperError::io(format!("cannot write token file {shown}"), &e))?;

    info!(event = "file_writer.wrote", path = %shown);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use tempfile::tempdir;
    use tokenkeeper_common::auth::TokenSet;

    use super::*;

    fn token(access: &str) -> TokenSet {
        TokenSet::new(access.to_string(), None, None, 3600, None)
    }

    #[tokio::test]
    async fn test_writes_immediately_and_on_change() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token");
        let cell = TokenCell::new(Some(token("first")));

        let task = spawn_file_writer(&path, cell.clone()).await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");

        cell.replace(token("second"));
        task.stop().await;

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_unwritable_target_fails_start() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("token");

        let err = spawn_file_writer(&path, TokenCell::new(Some(token("t")))).await.unwrap_err();
        assert!(matches!(err, KeeperError::Io(_)));
    }

    #[tokio::test]
    async fn test_empty_cell_writes_once_token_arrives() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token");
        let cell = TokenCell::new(None);

        let task = spawn_file_writer(&path, cell.clone()).await.unwrap();
        assert!(!path.exists());

        cell.replace(token("late"));
        task.stop().await;
        assert_eq!(fs::read_to_string(&path).unwrap(), "late");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_readers_never_see_partial_token() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token");
        let cell = TokenCell::new(Some(token("token-000")));
        let task = spawn_file_writer(&path, cell.clone()).await.unwrap();

        let done = Arc::new(AtomicBool::new(false));
        let reader = {
            let path = path.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                let mut reads = Vec::new();
                loop {
                    reads.push(fs::read_to_string(&path).unwrap());
                    if done.load(Ordering::Acquire) {
                        break;
                    }
                }
                reads
            })
        };

        for n in 1..200 {
            cell.replace(token(&format!("token-{n:03}")));
            tokio::task::yield_now().await;
        }
        task.stop().await;
        done.store(true, Ordering::Release);

        let reads = reader.join().unwrap();
        assert!(!reads.is_empty());
        for read in reads {
            assert_eq!(read.len(), "token-000".len(), "partial read: {read:?}");
            assert!(read.starts_with("token-"));
            assert!(read["token-".len()..].chars().all(|c| c.is_ascii_digit()));
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "token-199");
    }
}
