//! Composes listeners, the refresh loop and shutdown into the running service

use std::path::PathBuf;
use std::sync::Arc;

use tokenkeeper_domain::{ListenerKind, Result};
use tracing::{error, info};

use crate::lifecycle::{ShutdownController, ShutdownIntent};
use crate::listeners::ListenerManager;
use crate::scheduler::{should_echo, RefreshScheduler};
use crate::token::{TokenEcho, TokenManager};

/// Fixed run configuration, decided before the service starts
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub socket_path: Option<PathBuf>,
    pub file_path: Option<PathBuf>,
    pub threshold_secs: i64,
    pub debug: bool,
    pub daemonized: bool,
}

/// How the service ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A signal asked for shutdown and teardown completed
    Shutdown(ShutdownIntent),
    /// The run was cancelled without a recorded intent
    Cancelled,
}

/// The running service
pub struct Orchestrator {
    manager: Arc<dyn TokenManager>,
    echo: Arc<dyn TokenEcho>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        manager: Arc<dyn TokenManager>,
        echo: Arc<dyn TokenEcho>,
        config: OrchestratorConfig,
    ) -> Self {
        Self { manager, echo, config }
    }

    /// Start the configured outputs, run the refresh loop until shutdown,
    /// and stop the outputs again.
    ///
    /// Outputs are stopped on every exit path, including a failed start of
    /// the second output and a fatal refresh error.
    pub async fn run(&self, shutdown: &ShutdownController) -> Result<RunOutcome> {
        let listeners = ListenerManager::new(self.manager.clone());

        let result = match self.start_listeners(&listeners).await {
            Ok(()) => self.scheduler().run_loop(&shutdown.token()).await,
            Err(err) => Err(err),
        };

        listeners.stop_all().await;

        match result {
            Ok(()) => {
                let outcome = shutdown.intent().map_or(RunOutcome::Cancelled, RunOutcome::Shutdown);
                info!(event = "orchestrator.stopped", ?outcome);
                Ok(outcome)
            }
            Err(err) => {
                error!(event = "orchestrator.failed", error = %err);
                Err(err)
            }
        }
    }

    async fn start_listeners(&self, listeners: &ListenerManager) -> Result<()> {
        if let Some(path) = &self.config.socket_path {
            listeners.start(ListenerKind::Socket, path).await?;
        }
        if let Some(path) = &self.config.file_path {
            listeners.start(ListenerKind::File, path).await?;
        }
        Ok(())
    }

    fn scheduler(&self) -> RefreshScheduler {
        let scheduler = RefreshScheduler::new(self.manager.clone(), self.config.threshold_secs);
        let echo = should_echo(
            self.config.socket_path.is_some(),
            self.config.file_path.is_some(),
            self.config.debug,
            self.config.daemonized,
        );
        if echo {
            scheduler.with_echo(self.echo.clone())
        } else {
            scheduler
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokenkeeper_domain::KeeperError;

    use super::*;
    use crate::lifecycle::ShutdownSignal;
    use crate::testing::{token_expiring_in, MockTokenManager, RecordingEcho};

    fn config(socket: Option<&str>, file: Option<&str>) -> OrchestratorConfig {
        OrchestratorConfig {
            socket_path: socket.map(PathBuf::from),
            file_path: file.map(PathBuf::from),
            threshold_secs: 300,
            debug: true,
            daemonized: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_unwinds_listeners_in_order() {
        let mock = Arc::new(MockTokenManager::new(Some(token_expiring_in("a", 7200)), 3600));
        let echo = Arc::new(RecordingEcho::new());
        let orchestrator =
            Orchestrator::new(mock.clone(), echo.clone(), config(Some("/run/s"), Some("/run/f")));
        let shutdown = ShutdownController::new();

        let remote = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            remote.dispatch(ShutdownIntent::Graceful { signal: ShutdownSignal::Terminate });
        });

        let outcome = orchestrator.run(&shutdown).await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Shutdown(ShutdownIntent::Graceful { signal: ShutdownSignal::Terminate })
        );
        assert_eq!(
            mock.calls(),
            vec!["start_socket:/run/s", "start_file:/run/f", "stop_file", "stop_socket"]
        );
        assert!(echo.echoed().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_refresh_still_stops_listeners() {
        let mock = Arc::new(MockTokenManager::new(Some(token_expiring_in("a", 10)), 3600));
        mock.set_fail_refresh(true);
        let orchestrator =
            Orchestrator::new(mock.clone(), Arc::new(RecordingEcho::new()), config(Some("/s"), None));

        let err = orchestrator.run(&ShutdownController::new()).await.unwrap_err();

        assert!(matches!(err, KeeperError::Protocol(_)));
        assert!(!mock.socket_running());
        assert_eq!(mock.calls(), vec!["start_socket:/s", "refresh", "stop_socket"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_listener_start_unwinds_started_ones() {
        let mock = Arc::new(MockTokenManager::new(Some(token_expiring_in("a", 7200)), 3600));
        mock.set_fail_file_start(true);
        let orchestrator = Orchestrator::new(
            mock.clone(),
            Arc::new(RecordingEcho::new()),
            config(Some("/s"), Some("/f")),
        );

        assert!(orchestrator.run(&ShutdownController::new()).await.is_err());
        assert_eq!(mock.refresh_count(), 0);
        assert!(!mock.socket_running());
        assert_eq!(mock.calls(), vec!["start_socket:/s", "start_file:/f", "stop_socket"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_without_outputs_echoes_tokens() {
        let mock = Arc::new(MockTokenManager::new(Some(token_expiring_in("a", 10)), 600));
        let echo = Arc::new(RecordingEcho::new());
        let shutdown = ShutdownController::new();
        mock.cancel_after(1, shutdown.token());

        let orchestrator = Orchestrator::new(mock.clone(), echo.clone(), config(None, None));
        let outcome = orchestrator.run(&shutdown).await.unwrap();

        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(echo.echoed(), vec!["access-1"]);
        assert_eq!(mock.save_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_configured_never_echoes() {
        let mock = Arc::new(MockTokenManager::new(Some(token_expiring_in("a", 10)), 600));
        let echo = Arc::new(RecordingEcho::new());
        let shutdown = ShutdownController::new();
        mock.cancel_after(2, shutdown.token());

        let orchestrator = Orchestrator::new(mock.clone(), echo.clone(), config(None, Some("/f")));
        orchestrator.run(&shutdown).await.unwrap();

        assert_eq!(mock.refresh_count(), 2);
        assert!(echo.echoed().is_empty());
    }
}
