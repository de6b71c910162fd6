//! First-time authorization: authorization code + PKCE
//!
//! When the provider's redirect URI points at `http://localhost`, a loopback
//! listener receives the browser redirect. The user may instead paste the
//! full redirect URL on stdin; whichever arrives first wins.

use std::io::BufRead;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use axum::http::Uri;
use axum::response::Html;
use axum::Router;
use inquire::{Password, PasswordDisplayMode};
use tokenkeeper_common::auth::{OAuthClient, OAuthConfig};
use tokenkeeper_domain::{ClientCredentials, KeeperError, ProviderRegistration, Result};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

use crate::errors::InfraError;
use crate::session_store::Session;

const LOOPBACK_PREFIX: &str = "http://localhost";

/// User-facing side of the authorization flow
pub trait AuthorizationPrompt: Send + Sync {
    /// Show the URL to open; `listener_port` is set when a loopback
    /// listener is waiting for the redirect.
    fn show_authorization_url(&self, url: &str, listener_port: Option<u16>);

    /// Ask for the redirect URL on stdin
    fn ask_for_redirect(&self);

    /// A pasted line was not a redirect carrying a code
    fn reject_redirect(&self);

    /// The browser delivered the redirect first
    fn redirect_received_from_browser(&self);
}

/// Whether `url` could be an authorization redirect (has a `code` parameter)
#[must_use]
pub fn is_authorization_redirect(url: &str) -> bool {
    Url::parse(url.trim()).is_ok_and(|url| url.query_pairs().any(|(key, _)| key == "code"))
}

/// `code` and `state` from a redirect URL
pub fn redirect_params(url: &str) -> Result<(String, String)> {
    let url = Url::parse(url.trim())
        .map_err(|e| KeeperError::Protocol(format!("invalid redirect URL: {e}")))?;
    let param = |name: &str| {
        url.query_pairs().find(|(key, _)| key == name).map(|(_, value)| value.into_owned())
    };

    let code = param("code")
        .ok_or_else(|| KeeperError::Protocol("redirect URL carries no code".into()))?;
    let state = param("state").unwrap_or_default();
    Ok((code, state))
}

/// Client id and secret for a new session.
///
/// The id comes from the command line, else the registration; the secret
/// from the registration, else `prompt_secret` (an empty answer is allowed).
pub fn resolve_client_credentials(
    registration: &ProviderRegistration,
    client_id: Option<String>,
    prompt_secret: impl FnOnce() -> Result<String>,
) -> Result<ClientCredentials> {
    let client_id = client_id
        .or_else(|| registration.client_id.clone())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            KeeperError::Configuration(format!(
                "provider '{}' has no client id; pass --client-id",
                registration.name
            ))
        })?;

    let client_secret = match &registration.client_secret {
        Some(secret) => secret.clone(),
        None => prompt_secret()?,
    };

    Ok(ClientCredentials { client_id, client_secret: Some(client_secret).filter(|s| !s.is_empty()) })
}

/// Prompt for a client secret on the terminal
pub fn prompt_client_secret() -> Result<String> {
    Password::new("Client secret (empty for none):")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .map_err(|e| KeeperError::Configuration(format!("client secret prompt failed: {e}")))
}

/// OAuth client configuration for a resolved registration.
///
/// `{tenant}` placeholders in the endpoints are expanded.
pub fn oauth_config(
    registration: &ProviderRegistration,
    credentials: &ClientCredentials,
    redirect_uri: String,
) -> Result<OAuthConfig> {
    let endpoint = |value: &Option<String>, field: &str| {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .map(|v| registration.expand_tenant(v))
            .ok_or_else(|| {
                KeeperError::Configuration(format!(
                    "provider '{}' has no {field}",
                    registration.name
                ))
            })
    };

    let config = OAuthConfig::new(
        endpoint(&registration.authorize_endpoint, "authorize_endpoint")?,
        endpoint(&registration.token_endpoint, "token_endpoint")?,
        credentials.client_id.clone(),
        redirect_uri,
        registration.scope.clone().unwrap_or_default(),
    );
    Ok(config.with_client_secret(credentials.client_secret.clone()))
}

/// Loopback HTTP server that receives the authorization redirect.
pub struct CallbackServer {
    port: u16,
    redirect: Option<oneshot::Receiver<String>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

type RedirectSlot = Arc<StdMutex<Option<oneshot::Sender<String>>>>;

impl CallbackServer {
    /// Start listening on `127.0.0.1:port` (0 picks a free port).
    pub async fn start(port: u16) -> Result<Self> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port)))
            .await
            .map_err(|e| KeeperError::io(format!("cannot bind callback listener on port {port}"), &e))?;
        let port = listener
            .local_addr()
            .map_err(|e| KeeperError::io("cannot determine callback port", &e))?
            .port();

        let (redirect_tx, redirect_rx) = oneshot::channel();
        let slot: RedirectSlot = Arc::new(StdMutex::new(Some(redirect_tx)));
        let app = Router::new().fallback(move |uri: Uri| handle_redirect(uri, slot.clone()));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
            {
                error!(event = "callback.server_failed", error = %err);
            }
        });

        info!(event = "callback.listening", port);
        Ok(Self {
            port,
            redirect: Some(redirect_rx),
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Redirect URI to register with the authorization request
    #[must_use]
    pub fn redirect_uri(&self) -> String {
        format!("{LOOPBACK_PREFIX}:{}/", self.port)
    }

    /// Wait for the first valid redirect. Pends forever once it was taken.
    pub async fn redirect(&mut self) -> Option<String> {
        match self.redirect.as_mut() {
            Some(receiver) => {
                let url = receiver.await.ok();
                self.redirect = None;
                url
            }
            None => std::future::pending().await,
        }
    }

    /// Shut the server down and wait for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                error!(event = "callback.server_panicked", error = %err);
            }
        }
        debug!(event = "callback.stopped");
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if !handle.is_finished() {
                handle.abort();
            }
        }
    }
}

async fn handle_redirect(uri: Uri, slot: RedirectSlot) -> Html<String> {
    let url = format!("{LOOPBACK_PREFIX}{uri}");
    let message = if is_authorization_redirect(&url) {
        let sender = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        match sender {
            Some(sender) => {
                let _ = sender.send(url);
                "Authorization redirect completed. You may close this window."
            }
            None => {
                "The authorization redirect has already been provided and this server will shut down shortly."
            }
        }
    } else {
        "The requested URI does not represent an authorization redirect."
    };

    Html(format!(
        "<html><head><title>Authorization result</title></head><body><p>{message}</p></body></html>"
    ))
}

/// Lines typed on stdin, read on a dedicated thread.
///
/// The thread is not joined: it may still be blocked in `read_line` when
/// the setup runtime is shut down.
#[must_use]
pub fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Race the browser redirect against pasted lines.
pub async fn wait_for_redirect(
    server: Option<&mut CallbackServer>,
    lines: &mut mpsc::UnboundedReceiver<String>,
    prompt: &dyn AuthorizationPrompt,
) -> Result<String> {
    let listening = server.is_some();
    let browser = async {
        match server {
            Some(server) => server.redirect().await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(browser);

    let mut stdin_open = true;
    prompt.ask_for_redirect();
    loop {
        tokio::select! {
            url = &mut browser, if listening => {
                let url = url.ok_or_else(|| {
                    KeeperError::Protocol("callback listener stopped before a redirect arrived".into())
                })?;
                prompt.redirect_received_from_browser();
                return Ok(url);
            }
            line = lines.recv(), if stdin_open => match line {
                Some(line) if is_authorization_redirect(&line) => return Ok(line.trim().to_string()),
                Some(_) => {
                    prompt.reject_redirect();
                    prompt.ask_for_redirect();
                }
                None => {
                    debug!(event = "authorize.stdin_closed");
                    stdin_open = false;
                }
            },
            else => {
                return Err(KeeperError::Configuration(
                    "stdin closed before an authorization redirect was provided".into(),
                ));
            }
        }
    }
}

/// Run the authorization flow and build the first session.
///
/// `lines` supplies pasted redirect URLs (normally [`stdin_lines`]).
pub async fn authorize_new_session(
    registration: ProviderRegistration,
    credentials: ClientCredentials,
    port: u16,
    lines: &mut mpsc::UnboundedReceiver<String>,
    prompt: &dyn AuthorizationPrompt,
) -> Result<Session> {
    let configured_redirect = registration.redirect_uri.clone().ok_or_else(|| {
        KeeperError::Configuration(format!("provider '{}' has no redirect_uri", registration.name))
    })?;

    let mut server = if configured_redirect.starts_with(LOOPBACK_PREFIX) {
        Some(CallbackServer::start(port).await?)
    } else {
        None
    };
    let redirect_uri = server.as_ref().map_or(configured_redirect, CallbackServer::redirect_uri);

    let client = OAuthClient::new(oauth_config(&registration, &credentials, redirect_uri)?);
    let (url, _state) = client.generate_authorization_url().await.map_err(InfraError::from)?;
    prompt.show_authorization_url(&url, server.as_ref().map(CallbackServer::port));

    let redirect = wait_for_redirect(server.as_mut(), lines, prompt).await;
    if let Some(server) = server {
        server.shutdown().await;
    }

    let (code, state) = redirect_params(&redirect?)?;
    let token = client.exchange_code_for_tokens(&code, &state).await.map_err(InfraError::from)?;
    info!(event = "authorize.completed", provider = %registration.name, expires_at = ?token.expires_at);

    Ok(Session { registration, client: credentials, token })
}
