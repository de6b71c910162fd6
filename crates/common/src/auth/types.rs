//! OAuth 2.0 types and structures
//!
//! Token, token-response and client configuration types shared by the OAuth
//! client, the session store and the token manager.

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// OAuth 2.0 access and refresh tokens with metadata
///
/// - Optional refresh token (some providers don't issue them on refresh)
/// - Both `expires_in` (duration) and `expires_at` (timestamp)
/// - ID token support for OpenID Connect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Access token presented to the mail server
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// ID token (JWT) containing user claims (OpenID Connect)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Token type (usually "Bearer")
    pub token_type: String,

    /// Access token lifetime in seconds, as reported by the server
    pub expires_in: i64,

    /// Absolute expiration timestamp (UTC), calculated from `expires_in` at
    /// receipt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Granted scopes (space-separated)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenSet {
    /// Create a new `TokenSet` with calculated expiration time
    ///
    /// A non-positive `expires_in`, or one too large to express as a
    /// timestamp, leaves `expires_at` unset.
    #[must_use]
    pub fn new(
        access_token: String,
        refresh_token: Option<String>,
        id_token: Option<String>,
        expires_in: i64,
        scope: Option<String>,
    ) -> Self {
        let expires_at = if expires_in > 0 {
            TimeDelta::try_seconds(expires_in).and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
        } else {
            None
        };

        Self {
            access_token,
            refresh_token,
            id_token,
            token_type: "Bearer".to_string(),
            expires_in,
            expires_at,
            scope,
        }
    }
}

/// OAuth token response from authorization server
///
/// Standard OAuth 2.0 token response format (RFC 6749 §5.1).
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: i64,
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        let mut tokens = Self::new(
            response.access_token,
            response.refresh_token,
            response.id_token,
            response.expires_in,
            response.scope,
        );
        tokens.token_type = response.token_type;
        tokens
    }
}

/// OAuth client configuration for one provider registration
///
/// Endpoints are full URLs; any `{tenant}` placeholder has already been
/// expanded by the caller.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// Authorization endpoint the user's browser is sent to
    pub authorization_endpoint: String,

    /// Token endpoint for code exchange and refresh
    pub token_endpoint: String,

    /// OAuth client ID
    pub client_id: String,

    /// OAuth client secret; `None` or empty for public clients
    pub client_secret: Option<String>,

    /// Redirect URI (loopback listener or an out-of-band URI)
    pub redirect_uri: String,

    /// OAuth scopes to request
    pub scopes: Vec<String>,
}

impl OAuthConfig {
    /// Create a new OAuth configuration
    #[must_use]
    pub fn new(
        authorization_endpoint: String,
        token_endpoint: String,
        client_id: String,
        redirect_uri: String,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            authorization_endpoint,
            token_endpoint,
            client_id,
            client_secret: None,
            redirect_uri,
            scopes,
        }
    }

    /// Attach a client secret
    #[must_use]
    pub fn with_client_secret(mut self, secret: Option<String>) -> Self {
        self.client_secret = secret;
        self
    }

    /// Client secret to send, skipping an empty one
    #[must_use]
    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref().filter(|s| !s.is_empty())
    }

    /// Get scopes as space-separated string
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// OAuth error response from authorization server
///
/// Standard OAuth 2.0 error response format (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
pub struct OAuthError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthError {}
