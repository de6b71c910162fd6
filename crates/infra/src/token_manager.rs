//! Session-backed implementation of the core token manager port

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokenkeeper_common::auth::{OAuthClient, OAuthClientTrait, TokenSet};
use tokenkeeper_core::{TokenCell, TokenManager};
use tokenkeeper_domain::{ClientCredentials, KeeperError, ProviderRegistration, Result};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::authorize::oauth_config;
use crate::errors::InfraError;
use crate::listeners::{spawn_file_writer, spawn_socket_responder, ListenerTask};
use crate::session_store::{Session, SessionStore};

/// Owns the token, the unlocked session file and the two token outputs.
pub struct SessionTokenManager<C: OAuthClientTrait = OAuthClient> {
    client: C,
    store: Arc<SessionStore>,
    registration: ProviderRegistration,
    credentials: ClientCredentials,
    cell: TokenCell,
    socket: Mutex<Option<ListenerTask>>,
    file: Mutex<Option<ListenerTask>>,
}

impl SessionTokenManager<OAuthClient> {
    /// Build a manager with an HTTP client for the session's provider.
    ///
    /// Call this on the runtime that will run the service; the HTTP client's
    /// connection pool is bound to it.
    pub fn from_session(store: SessionStore, session: Session) -> Result<Self> {
        let redirect_uri = session.registration.redirect_uri.clone().unwrap_or_default();
        let config = oauth_config(&session.registration, &session.client, redirect_uri)?;
        Ok(Self::new(OAuthClient::new(config), store, session))
    }
}

impl<C: OAuthClientTrait> SessionTokenManager<C> {
    pub fn new(client: C, store: SessionStore, session: Session) -> Self {
        Self {
            client,
            store: Arc::new(store),
            registration: session.registration,
            credentials: session.client,
            cell: TokenCell::new(Some(session.token)),
            socket: Mutex::new(None),
            file: Mutex::new(None),
        }
    }

    fn current(&self) -> Result<Arc<TokenSet>> {
        self.cell.get().ok_or_else(|| KeeperError::NoToken("session holds no token".into()))
    }
}

#[async_trait]
impl<C: OAuthClientTrait> TokenManager for SessionTokenManager<C> {
    fn token(&self) -> Option<Arc<TokenSet>> {
        self.cell.get()
    }

    async fn refresh_token(&self) -> Result<()> {
        let current = self.current()?;
        let refresh_token = current.refresh_token.as_deref().unwrap_or_default();

        let tokens = self
            .client
            .refresh_access_token(refresh_token)
            .await
            .map_err(InfraError::from)?;

        info!(
            event = "token.refreshed",
            expires_at = ?tokens.expires_at,
            rotated = tokens.refresh_token.as_deref() != current.refresh_token.as_deref()
        );
        self.cell.replace(tokens);
        Ok(())
    }

    async fn save_session(&self) -> Result<()> {
        let session = Session {
            registration: self.registration.clone(),
            client: self.credentials.clone(),
            token: self.current()?.as_ref().clone(),
        };

        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.save(&session))
            .await
            .map_err(|e| KeeperError::Io(format!("session writer failed: {e}")))?
    }

    async fn start_socket_listener(&self, path: &Path) -> Result<()> {
        let mut slot = self.socket.lock().await;
        if slot.is_some() {
            return Err(KeeperError::Configuration("socket listener already running".into()));
        }
        *slot = Some(spawn_socket_responder(path, self.cell.clone()).await?);
        Ok(())
    }

    async fn stop_socket_listener(&self) {
        let task = self.socket.lock().await.take();
        match task {
            Some(task) => task.stop().await,
            None => debug!(event = "token_manager.socket_not_running"),
        }
    }

    async fn start_file_writer(&self, path: &Path) -> Result<()> {
        let mut slot = self.file.lock().await;
        if slot.is_some() {
            return Err(KeeperError::Configuration("file writer already running".into()));
        }
        *slot = Some(spawn_file_writer(path, self.cell.clone()).await?);
        Ok(())
    }

    async fn stop_file_writer(&self) {
        let task = self.file.lock().await.take();
        match task {
            Some(task) => task.stop().await,
            None => debug!(event = "token_manager.file_writer_not_running"),
        }
    }
}
