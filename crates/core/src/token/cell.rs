//! Shared token cell
//!
//! The token is written by the refresh path and read by both listener tasks.
//! Every write replaces the whole `Arc<TokenSet>`; readers clone the snapshot
//! and never see a half-updated token.

use std::sync::Arc;

use tokenkeeper_common::auth::TokenSet;
use tokio::sync::watch;

/// Single-writer, many-reader holder for the current token
#[derive(Debug, Clone)]
pub struct TokenCell {
    sender: Arc<watch::Sender<Option<Arc<TokenSet>>>>,
}

impl TokenCell {
    /// Create a cell holding `initial`
    #[must_use]
    pub fn new(initial: Option<TokenSet>) -> Self {
        let (sender, _) = watch::channel(initial.map(Arc::new));
        Self { sender: Arc::new(sender) }
    }

    /// Current snapshot
    #[must_use]
    pub fn get(&self) -> Option<Arc<TokenSet>> {
        self.sender.borrow().clone()
    }

    /// Replace the token and wake every subscriber
    pub fn replace(&self, token: TokenSet) {
        self.sender.send_replace(Some(Arc::new(token)));
    }

    /// Receiver notified on every replacement
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<TokenSet>>> {
        self.sender.subscribe()
    }
}
