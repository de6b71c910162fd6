//! Single dispatch point for shutdown intents

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::policy::ShutdownIntent;

/// Records the first shutdown intent and cancels the run.
///
/// Cheap to clone; all clones share the same intent and token.
#[derive(Debug, Clone, Default)]
pub struct ShutdownController {
    token: CancellationToken,
    intent: Arc<OnceLock<ShutdownIntent>>,
}

impl ShutdownController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token observed by the refresh loop
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Record `intent` and cancel. Returns `false` if an intent was already
    /// recorded; later intents are ignored.
    pub fn dispatch(&self, intent: ShutdownIntent) -> bool {
        let first = self.intent.set(intent).is_ok();
        if first {
            info!(event = "shutdown.requested", signal = %intent.signal());
        } else {
            debug!(event = "shutdown.repeated", signal = %intent.signal());
        }
        self.token.cancel();
        first
    }

    /// The recorded intent, if shutdown was requested
    #[must_use]
    pub fn intent(&self) -> Option<ShutdownIntent> {
        self.intent.get().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ShutdownSignal;

    #[test]
    fn test_first_intent_wins() {
        let controller = ShutdownController::new();
        let term = ShutdownIntent::Graceful { signal: ShutdownSignal::Terminate };

        assert!(controller.dispatch(term));
        assert!(!controller.dispatch(ShutdownIntent::Hangup));

        assert_eq!(controller.intent(), Some(term));
        assert!(controller.token().is_cancelled());
    }

    #[tokio::test]
    async fn test_dispatch_wakes_token_holders() {
        let controller = ShutdownController::new();
        let token = controller.token();

        let remote = controller.clone();
        tokio::spawn(async move { remote.dispatch(ShutdownIntent::Hangup) });

        token.cancelled().await;
        assert_eq!(controller.intent(), Some(ShutdownIntent::Hangup));
    }
}
