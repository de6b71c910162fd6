//! Traits for OAuth operations
//!
//! Abstracts the token endpoint so the token manager and the authorization
//! flow can be tested with mock implementations.

use async_trait::async_trait;

use super::client::OAuthClientError;
use super::types::TokenSet;

/// Trait for OAuth client operations
#[async_trait]
pub trait OAuthClientTrait: Send + Sync {
    /// Generate authorization URL for browser-based login
    ///
    /// # Returns
    /// Tuple of (authorization_url, state) where state must be validated in
    /// callback
    async fn generate_authorization_url(&self) -> Result<(String, String), OAuthClientError>;

    /// Exchange authorization code for tokens
    ///
    /// # Errors
    /// Returns error if state mismatch, token exchange fails, or response
    /// parsing fails
    async fn exchange_code_for_tokens(
        &self,
        code: &str,
        state: &str,
    ) -> Result<TokenSet, OAuthClientError>;

    /// Refresh access token using refresh token
    ///
    /// # Errors
    /// Returns error if refresh fails or token is invalid/revoked
    async fn refresh_access_token(&self, refresh_token: &str)
        -> Result<TokenSet, OAuthClientError>;

    /// Get the configured redirect URI
    fn redirect_uri(&self) -> &str;
}
