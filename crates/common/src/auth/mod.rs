//! OAuth 2.0 + PKCE client
//!
//! # Architecture
//!
//! ```text
//! OAuthClient ──► PKCE utilities   (challenge + state)
//!      │
//!      └──► token endpoint         (code exchange, refresh)
//! ```
//!
//! # Module Organization
//!
//! - **[`types`]**: `TokenSet`, `OAuthConfig`, `OAuthError`
//! - **[`pkce`]**: PKCE challenge generation
//! - **[`client`]**: HTTP client for authorization and token exchange
//! - **[`traits`]**: `OAuthClientTrait` for dependency injection

pub mod client;
pub mod pkce;
pub mod traits;
pub mod types;

pub use client::{OAuthClient, OAuthClientError};
pub use pkce::{generate_code_challenge, generate_code_verifier, generate_state, PKCEChallenge};
pub use traits::OAuthClientTrait;
pub use types::{OAuthConfig, OAuthError, TokenResponse, TokenSet};
