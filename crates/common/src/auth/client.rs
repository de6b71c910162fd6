//! OAuth 2.0 client implementation with PKCE support
//!
//! Handles the authorization-code flow against a provider's endpoints:
//! - PKCE challenge generation
//! - Browser authorization URL building
//! - Authorization code exchange
//! - Token refresh

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::Mutex;

use super::pkce::PKCEChallenge;
use super::traits::OAuthClientTrait;
use super::types::{OAuthConfig, OAuthError, TokenResponse, TokenSet};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for OAuth client operations
#[derive(Debug)]
pub enum OAuthClientError {
    /// HTTP request failed
    RequestFailed(reqwest::Error),

    /// OAuth server returned a structured error
    OAuthError(OAuthError),

    /// OAuth server returned a non-success status without an OAuth error body
    UnexpectedStatus { status: u16, body: String },

    /// State parameter mismatch (CSRF attack detected)
    StateMismatch { expected: String, received: String },

    /// Failed to parse response
    ParseError(String),

    /// No refresh token available
    NoRefreshToken,

    /// Invalid configuration or call sequence
    ConfigError(String),
}

impl std::fmt::Display for OAuthClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestFailed(e) => write!(f, "HTTP request failed: {e}"),
            Self::OAuthError(e) => write!(f, "OAuth error: {e}"),
            Self::UnexpectedStatus { status, body } => {
                write!(f, "Token endpoint returned HTTP {status}: {body}")
            }
            Self::StateMismatch { expected, received } => {
                write!(f, "State mismatch (CSRF): expected {expected}, received {received}")
            }
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
            Self::NoRefreshToken => write!(f, "No refresh token available"),
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for OAuthClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::RequestFailed(e) => Some(e),
            Self::OAuthError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for OAuthClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed(err)
    }
}

/// OAuth 2.0 client with PKCE support
///
/// Implements RFC 6749 (OAuth 2.0) and RFC 7636 (PKCE).
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    client: Client,
    current_challenge: Arc<Mutex<Option<PKCEChallenge>>>,
}

impl OAuthClient {
    /// Create a new OAuth client with the given configuration
    ///
    /// ```
    /// use tokenkeeper_common::auth::{OAuthClient, OAuthConfig};
    ///
    /// let config = OAuthConfig::new(
    ///     "https://accounts.google.com/o/oauth2/auth".to_string(),
    ///     "https://oauth2.googleapis.com/token".to_string(),
    ///     "client_id".to_string(),
    ///     "http://localhost:8080/".to_string(),
    ///     vec!["https://mail.google.com/".to_string()],
    /// );
    /// let client = OAuthClient::new(config);
    /// assert_eq!(client.redirect_uri(), "http://localhost:8080/");
    /// ```
    #[must_use]
    pub fn new(config: OAuthConfig) -> Self {
        let client =
            Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_else(|_| Client::new());

        Self { config, client, current_challenge: Arc::new(Mutex::new(None)) }
    }

    /// Generate authorization URL for browser-based login
    ///
    /// # Returns
    /// Tuple of (authorization_url, state) where state must be validated in
    /// the callback
    pub async fn generate_authorization_url(&self) -> Result<(String, String), OAuthClientError> {
        let challenge = PKCEChallenge::generate();
        let state = challenge.state.clone();

        let params = [
            ("response_type", "code".to_string()),
            ("client_id", self.config.client_id.clone()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("scope", self.config.scope_string()),
            ("state", state.clone()),
            ("code_challenge", challenge.code_challenge.clone()),
            ("code_challenge_method", challenge.challenge_method().to_string()),
        ];

        // Stored for the token exchange
        *self.current_challenge.lock().await = Some(challenge);

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let separator = if self.config.authorization_endpoint.contains('?') { '&' } else { '?' };
        let url = format!("{}{separator}{query_string}", self.config.authorization_endpoint);

        Ok((url, state))
    }

    /// Exchange authorization code for tokens
    ///
    /// Validates the state parameter against the pending challenge, then
    /// posts the code and PKCE verifier to the token endpoint.
    ///
    /// # Errors
    /// Returns error if:
    /// - No authorization URL was generated first
    /// - State mismatch (CSRF attack)
    /// - Token exchange fails
    /// - Response parsing fails
    pub async fn exchange_code_for_tokens(
        &self,
        code: &str,
        state: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        let challenge =
            self.current_challenge.lock().await.take().ok_or_else(|| {
                OAuthClientError::ConfigError("No PKCE challenge found".to_string())
            })?;

        if challenge.state != state {
            return Err(OAuthClientError::StateMismatch {
                expected: challenge.state,
                received: state.to_string(),
            });
        }

        let mut request_body = vec![
            ("grant_type", "authorization_code".to_string()),
            ("client_id", self.config.client_id.clone()),
            ("code", code.to_string()),
            ("redirect_uri", self.config.redirect_uri.clone()),
            ("code_verifier", challenge.code_verifier),
        ];

        if let Some(secret) = self.config.client_secret() {
            request_body.push(("client_secret", secret.to_string()));
        }

        self.post_token_request(&request_body).await
    }

    /// Refresh access token using refresh token
    ///
    /// If the server does not rotate the refresh token, the one passed in is
    /// carried over into the returned `TokenSet`.
    ///
    /// # Errors
    /// Returns error if:
    /// - No refresh token provided
    /// - Refresh fails
    /// - Token is invalid/revoked
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        if refresh_token.is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }

        let mut params = vec![
            ("grant_type", "refresh_token".to_string()),
            ("client_id", self.config.client_id.clone()),
            ("refresh_token", refresh_token.to_string()),
        ];

        if let Some(secret) = self.config.client_secret() {
            params.push(("client_secret", secret.to_string()));
        }

        let mut tokens = self.post_token_request(&params).await?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        Ok(tokens)
    }

    async fn post_token_request(
        &self,
        form: &[(&str, String)],
    ) -> Result<TokenSet, OAuthClientError> {
        let response = self.client.post(&self.config.token_endpoint).form(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<OAuthError>(&body) {
                Ok(error) => OAuthClientError::OAuthError(error),
                Err(_) => OAuthClientError::UnexpectedStatus { status: status.as_u16(), body },
            });
        }

        let token_response: TokenResponse =
            response.json().await.map_err(|e| OAuthClientError::ParseError(e.to_string()))?;

        Ok(token_response.into())
    }

    /// Get the configured redirect URI
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.config.redirect_uri
    }
}

#[async_trait]
impl OAuthClientTrait for OAuthClient {
    async fn generate_authorization_url(&self) -> Result<(String, String), OAuthClientError> {
        self.generate_authorization_url().await
    }

    async fn exchange_code_for_tokens(
        &self,
        code: &str,
        state: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        self.exchange_code_for_tokens(code, state).await
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        self.refresh_access_token(refresh_token).await
    }

    fn redirect_uri(&self) -> &str {
        self.redirect_uri()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::client.
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config_for(server_uri: &str) -> OAuthConfig {
        OAuthConfig::new(
            format!("{server_uri}/authorize"),
            format!("{server_uri}/token"),
            "test_client_id".to_string(),
            "http://localhost:3000/".to_string(),
            vec!["https://outlook.office.com/IMAP.AccessAsUser.All".to_string()],
        )
    }

    #[tokio::test]
    async fn test_generate_authorization_url() {
        let client = OAuthClient::new(config_for("https://login.example.com"));

        let (url, state) = client.generate_authorization_url().await.unwrap();

        assert!(url.starts_with("https://login.example.com/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2F"));
        assert!(url.contains("code_challenge="));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains(&format!("state={state}")));
    }

    #[tokio::test]
    async fn test_state_validation() {
        let client = OAuthClient::new(config_for("https://login.example.com"));
        client.generate_authorization_url().await.unwrap();

        let result = client.exchange_code_for_tokens("test_code", "wrong_state").await;
        assert!(matches!(result, Err(OAuthClientError::StateMismatch { .. })));
    }

    #[tokio::test]
    async fn test_exchange_without_challenge() {
        let client = OAuthClient::new(config_for("https://login.example.com"));
        let result = client.exchange_code_for_tokens("code", "state").await;
        assert!(matches!(result, Err(OAuthClientError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_exchange_code_posts_verifier() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("code_verifier="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "refresh_token": "r1",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OAuthClient::new(config_for(&server.uri()));
        let (_, state) = client.generate_authorization_url().await.unwrap();
        let tokens = client.exchange_code_for_tokens("the-code", &state).await.unwrap();

        assert_eq!(tokens.access_token, "fresh");
        assert_eq!(tokens.refresh_token.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn test_refresh_keeps_previous_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("client_secret=s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "next",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;

        let config = config_for(&server.uri()).with_client_secret(Some("s3cret".to_string()));
        let client = OAuthClient::new(config);
        let tokens = client.refresh_access_token("old-refresh").await.unwrap();

        assert_eq!(tokens.access_token, "next");
        assert_eq!(tokens.refresh_token.as_deref(), Some("old-refresh"));
    }

    #[tokio::test]
    async fn test_refresh_surfaces_oauth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Token has been expired or revoked."
            })))
            .mount(&server)
            .await;

        let client = OAuthClient::new(config_for(&server.uri()));
        let err = client.refresh_access_token("revoked").await.unwrap_err();

        assert!(matches!(err, OAuthClientError::OAuthError(ref e) if e.error == "invalid_grant"));
        assert!(err.to_string().contains("expired or revoked"));
    }

    #[tokio::test]
    async fn test_refresh_non_json_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = OAuthClient::new(config_for(&server.uri()));
        let err = client.refresh_access_token("r").await.unwrap_err();
        assert!(matches!(err, OAuthClientError::UnexpectedStatus { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_refresh_with_empty_token() {
        let client = OAuthClient::new(config_for("https://login.example.com"));
        let result = client.refresh_access_token("").await;
        assert!(matches!(result, Err(OAuthClientError::NoRefreshToken)));
    }
}
