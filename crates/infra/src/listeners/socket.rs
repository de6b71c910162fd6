//! Unix-domain socket answering every connection with the current token
//!
//! One request per connection, answered with a bare HTTP/1.0 response, so
//! `curl --unix-socket PATH http://localhost/` prints the access token.

use std::fs::Permissions;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use tokenkeeper_core::TokenCell;
use tokenkeeper_domain::constants::MAX_SOCKET_REQUEST_BYTES;
use tokenkeeper_domain::{KeeperError, ListenerKind, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ListenerTask;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Bind `path` (replacing a stale socket) and serve the token from `cell`.
pub async fn spawn_socket_responder(path: &Path, cell: TokenCell) -> Result<ListenerTask> {
    crate::fs::remove_if_exists(path)
        .map_err(|e| KeeperError::io(format!("cannot remove stale socket {}", path.display()), &e))?;

    let listener = UnixListener::bind(path)
        .map_err(|e| KeeperError::io(format!("cannot bind socket {}", path.display()), &e))?;
    std::fs::set_permissions(path, Permissions::from_mode(0o600))
        .map_err(|e| KeeperError::io(format!("cannot restrict socket {}", path.display()), &e))?;

    info!(event = "socket.listening", path = %path.display());

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(accept_loop(listener, cell, cancel.clone()));
    Ok(ListenerTask::new(ListenerKind::Socket, path.to_path_buf(), cancel, handle))
}

async fn accept_loop(listener: UnixListener, cell: TokenCell, cancel: CancellationToken) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let cell = cell.clone();
                    tokio::spawn(async move {
                        if let Err(err) = serve_connection(stream, &cell).await {
                            debug!(event = "socket.connection_failed", error = %err);
                        }
                    });
                }
                Err(err) => warn!(event = "socket.accept_failed", error = %err),
            },
        }
    }
}

async fn serve_connection(mut stream: UnixStream, cell: &TokenCell) -> std::io::Result<()> {
    let request = match tokio::time::timeout(READ_TIMEOUT, read_request(&mut stream)).await {
        Ok(request) => request?,
        Err(_) => {
            debug!(event = "socket.request_timeout");
            Vec::new()
        }
    };

    let head_only = request.starts_with(b"HEAD ");
    let token = cell.get();
    let response = render_response(token.as_deref().map(|t| t.access_token.as_str()), head_only);

    stream.write_all(&response).await?;
    stream.shutdown().await
}

/// Read until the end of the request headers, EOF, or the size cap.
async fn read_request(stream: &mut UnixStream) -> std::io::Result<Vec<u8>> {
    let mut request = Vec::with_capacity(512);
    let mut chunk = [0u8; 1024];

    while request.len() < MAX_SOCKET_REQUEST_BYTES && !headers_complete(&request) {
        let room = (MAX_SOCKET_REQUEST_BYTES - request.len()).min(chunk.len());
        let read = stream.read(&mut chunk[..room]).await?;
        if read == 0 {
            break;
        }
        request.extend_from_slice(&chunk[..read]);
    }
    Ok(request)
}

fn headers_complete(request: &[u8]) -> bool {
    request.windows(4).any(|w| w == b"\r\n\r\n") || request.windows(2).any(|w| w == b"\n\n")
}

fn render_response(access_token: Option<&str>, head_only: bool) -> Vec<u8> {
    let (status, body) = match access_token {
        Some(token) => ("200 OK", token.to_string()),
        None => ("503 Service Unavailable", "no access token available\n".to_string()),
    };

    let mut response = format!(
        "HTTP/1.0 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    if !head_only {
        response.push_str(&body);
    }
    response.into_bytes()
}
