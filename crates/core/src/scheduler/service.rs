//! Refresh scheduler: sleeps until shortly before expiry, refreshes, persists

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokenkeeper_domain::{KeeperError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::token::{TokenEcho, TokenManager};

/// Whether freshly refreshed tokens should go to the primary output stream.
///
/// Only when no listener output is configured and the process is in debug
/// mode or still attached to its terminal.
#[must_use]
pub fn should_echo(socket_configured: bool, file_configured: bool, debug: bool, daemonized: bool) -> bool {
    !socket_configured && !file_configured && (debug || !daemonized)
}

/// Drives the wait → refresh → persist cycle
pub struct RefreshScheduler {
    manager: Arc<dyn TokenManager>,
    threshold_secs: i64,
    echo: Option<Arc<dyn TokenEcho>>,
}

impl RefreshScheduler {
    /// Create a scheduler refreshing `threshold_secs` before expiry
    pub fn new(manager: Arc<dyn TokenManager>, threshold_secs: i64) -> Self {
        Self { manager, threshold_secs, echo: None }
    }

    /// Echo every refreshed token through `echo`
    #[must_use]
    pub fn with_echo(mut self, echo: Arc<dyn TokenEcho>) -> Self {
        self.echo = Some(echo);
        self
    }

    /// Time to wait from `now` before the next refresh:
    /// `max(0, expiry - threshold - now)`.
    ///
    /// # Errors
    /// - `NoToken` if no token is held
    /// - `Protocol` if the held token carries no expiry
    pub fn compute_wait(&self, now: DateTime<Utc>) -> Result<Duration> {
        if self.manager.token().is_none() {
            return Err(KeeperError::NoToken("no token held, cannot schedule a refresh".to_string()));
        }
        let expiry = self.manager.access_token_expiry().ok_or_else(|| {
            KeeperError::Protocol("token endpoint did not report an expiry".to_string())
        })?;

        // A threshold reaching past the earliest timestamp means refresh now.
        let Some(refresh_at) =
            TimeDelta::try_seconds(self.threshold_secs).and_then(|t| expiry.checked_sub_signed(t))
        else {
            return Ok(Duration::ZERO);
        };
        Ok((refresh_at - now).to_std().unwrap_or(Duration::ZERO))
    }

    /// Run until `cancel` fires.
    ///
    /// Cancellation interrupts the wait and returns `Ok(())`. Any refresh or
    /// save failure ends the loop with that error; nothing is retried.
    pub async fn run_loop(&self, cancel: &CancellationToken) -> Result<()> {
        loop {
            let wait = self.compute_wait(Utc::now())?;
            debug!(event = "scheduler.waiting", wait_secs = wait.as_secs(), "waiting for next refresh");

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(event = "scheduler.cancelled", "refresh loop cancelled");
                    return Ok(());
                }
                () = tokio::time::sleep(wait) => {}
            }

            info!(event = "scheduler.refreshing", "refreshing access token");
            self.manager.refresh_token().await?;

            let token = self.manager.token().ok_or_else(|| {
                KeeperError::NoToken("refresh reported success but no token is held".to_string())
            })?;

            self.manager.save_session().await?;
            info!(
                event = "scheduler.refreshed",
                expires_at = ?token.expires_at,
                "access token refreshed and session saved"
            );

            if let Some(echo) = &self.echo {
                echo.echo(&token.access_token);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{token_expiring_in, MockTokenManager, RecordingEcho};

    fn scheduler(manager: &Arc<MockTokenManager>, threshold: i64) -> RefreshScheduler {
        RefreshScheduler::new(manager.clone(), threshold)
    }

    #[test]
    fn test_compute_wait_before_threshold() {
        let manager = Arc::new(MockTokenManager::new(Some(token_expiring_in("a", 3600)), 3600));
        let now = Utc::now();

        let wait = scheduler(&manager, 300).compute_wait(now).unwrap();
        let expected = (manager.access_token_expiry().unwrap() - now).num_seconds() - 300;
        assert_eq!(wait.as_secs() as i64, expected);
    }

    #[test]
    fn test_compute_wait_clamps_to_zero_inside_threshold() {
        let manager = Arc::new(MockTokenManager::new(Some(token_expiring_in("a", 100)), 3600));
        let wait = scheduler(&manager, 300).compute_wait(Utc::now()).unwrap();
        assert_eq!(wait, Duration::ZERO);
    }

    #[test]
    fn test_compute_wait_clamps_after_expiry() {
        let manager = Arc::new(MockTokenManager::new(Some(token_expiring_in("a", 60)), 3600));
        let later = Utc::now() + chrono::Duration::hours(2);
        assert_eq!(scheduler(&manager, 0).compute_wait(later).unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_compute_wait_with_huge_threshold_refreshes_now() {
        let manager = Arc::new(MockTokenManager::new(Some(token_expiring_in("a", 3600)), 3600));
        assert_eq!(scheduler(&manager, i64::MAX).compute_wait(Utc::now()).unwrap(), Duration::ZERO);
        assert_eq!(
            scheduler(&manager, i64::MAX / 1000).compute_wait(Utc::now()).unwrap(),
            Duration::ZERO
        );
    }

    #[test]
    fn test_compute_wait_without_token() {
        let manager = Arc::new(MockTokenManager::new(None, 3600));
        let err = scheduler(&manager, 300).compute_wait(Utc::now()).unwrap_err();
        assert!(matches!(err, KeeperError::NoToken(_)));
    }

    #[test]
    fn test_compute_wait_without_expiry() {
        let manager = Arc::new(MockTokenManager::new(Some(token_expiring_in("a", 0)), 3600));
        let err = scheduler(&manager, 300).compute_wait(Utc::now()).unwrap_err();
        assert!(matches!(err, KeeperError::Protocol(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_immediately_then_sleeps() {
        // threshold 300s, expiry now+100: refresh at once, then the new
        // token (now+3600) schedules the next refresh about 3300s out
        let manager = Arc::new(MockTokenManager::new(Some(token_expiring_in("old", 100)), 3600));
        let cancel = CancellationToken::new();
        manager.cancel_after(1, cancel.clone());

        scheduler(&manager, 300).run_loop(&cancel).await.unwrap();

        assert_eq!(manager.refresh_count(), 1);
        let wait = scheduler(&manager, 300).compute_wait(Utc::now()).unwrap();
        assert!(wait.as_secs() > 3290 && wait.as_secs() <= 3300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_refresh_is_followed_by_a_save() {
        let manager = Arc::new(MockTokenManager::new(Some(token_expiring_in("old", 10)), 600));
        let cancel = CancellationToken::new();
        manager.cancel_after(3, cancel.clone());

        scheduler(&manager, 300).run_loop(&cancel).await.unwrap();

        assert_eq!(manager.refresh_count(), 3);
        assert_eq!(manager.save_count(), 3);
        assert_eq!(manager.calls(), vec!["refresh", "save", "refresh", "save", "refresh", "save"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_wait() {
        let manager = Arc::new(MockTokenManager::new(Some(token_expiring_in("a", 7200)), 3600));
        let cancel = CancellationToken::new();

        let handle = {
            let manager = manager.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { scheduler(&manager, 300).run_loop(&cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(60)).await;
        cancel.cancel();

        handle.await.unwrap().unwrap();
        assert_eq!(manager.refresh_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_is_fatal() {
        let manager = Arc::new(MockTokenManager::new(Some(token_expiring_in("a", 10)), 3600));
        manager.set_fail_refresh(true);

        let err = scheduler(&manager, 300).run_loop(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, KeeperError::Protocol(_)));
        assert_eq!(manager.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_failure_is_fatal() {
        let manager = Arc::new(MockTokenManager::new(Some(token_expiring_in("a", 10)), 3600));
        manager.set_fail_save(true);

        let err = scheduler(&manager, 300).run_loop(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, KeeperError::Io(_)));
        assert_eq!(manager.refresh_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_token_after_refresh_aborts() {
        let manager = Arc::new(MockTokenManager::new(Some(token_expiring_in("a", 10)), 3600));
        manager.set_drop_token_on_refresh(true);

        let err = scheduler(&manager, 300).run_loop(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, KeeperError::NoToken(_)));
        assert_eq!(manager.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_echo_receives_each_new_token() {
        let manager = Arc::new(MockTokenManager::new(Some(token_expiring_in("old", 10)), 600));
        let echo = Arc::new(RecordingEcho::new());
        let cancel = CancellationToken::new();
        manager.cancel_after(2, cancel.clone());

        scheduler(&manager, 300).with_echo(echo.clone()).run_loop(&cancel).await.unwrap();

        assert_eq!(echo.echoed(), vec!["access-1", "access-2"]);
    }

    #[test]
    fn test_should_echo_policy() {
        assert!(should_echo(false, false, false, false));
        assert!(should_echo(false, false, true, true));
        assert!(!should_echo(false, false, false, true));
        assert!(!should_echo(true, false, true, false));
        assert!(!should_echo(false, true, true, false));
    }
}
