//! Port interfaces for the token manager
//!
//! These traits define the boundary between the refresh/listener policy in
//! this crate and the OAuth, session-file and transport adapters in infra.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokenkeeper_common::auth::TokenSet;
use tokenkeeper_domain::Result;

/// Owner of the current token, the session file and the token outputs
#[async_trait]
pub trait TokenManager: Send + Sync {
    /// Snapshot of the current token, if one is held
    fn token(&self) -> Option<Arc<TokenSet>>;

    /// Absolute expiry of the current access token
    fn access_token_expiry(&self) -> Option<DateTime<Utc>> {
        self.token().and_then(|token| token.expires_at)
    }

    /// Obtain a new token from the token endpoint and publish it
    async fn refresh_token(&self) -> Result<()>;

    /// Persist the session (registration, client, current token)
    async fn save_session(&self) -> Result<()>;

    /// Serve the current token on a Unix-domain socket at `path`
    async fn start_socket_listener(&self, path: &Path) -> Result<()>;

    /// Stop the socket responder; a no-op if it is not running
    async fn stop_socket_listener(&self);

    /// Keep the file at `path` holding the current token
    async fn start_file_writer(&self, path: &Path) -> Result<()>;

    /// Stop the file writer; a no-op if it is not running
    async fn stop_file_writer(&self);
}

/// Foreground output for freshly refreshed access tokens
pub trait TokenEcho: Send + Sync {
    /// Emit `access_token` on the primary output stream
    fn echo(&self, access_token: &str);
}
