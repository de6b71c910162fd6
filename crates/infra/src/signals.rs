//! Delivers Unix signals to the shutdown controller
//!
//! Handlers are installed only for signals whose disposition is a shutdown;
//! everything else keeps the operating system's default action.

use tokenkeeper_core::{
    signal_disposition, ShutdownController, ShutdownIntent, ShutdownSignal, SignalDisposition,
};
use tokenkeeper_domain::{KeeperError, Result};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::debug;

fn kind(sig: ShutdownSignal) -> SignalKind {
    match sig {
        ShutdownSignal::Terminate => SignalKind::terminate(),
        ShutdownSignal::Interrupt => SignalKind::interrupt(),
        ShutdownSignal::Hangup => SignalKind::hangup(),
    }
}

/// An installed handler and the intent it dispatches
struct Handler {
    stream: Signal,
    intent: ShutdownIntent,
}

fn install(sig: ShutdownSignal, daemonized: bool) -> Result<Option<Handler>> {
    let SignalDisposition::Shutdown(intent) = signal_disposition(sig, daemonized) else {
        return Ok(None);
    };
    let stream = signal(kind(sig))
        .map_err(|e| KeeperError::io(format!("cannot install {sig} handler"), &e))?;
    debug!(event = "signals.installed", signal = %sig);
    Ok(Some(Handler { stream, intent }))
}

async fn recv(handler: Option<&mut Handler>) -> Option<ShutdownIntent> {
    let handler = handler?;
    handler.stream.recv().await.map(|()| handler.intent)
}

/// Install the handlers and spawn the single dispatch task.
///
/// Must be called inside the service runtime. Handlers are registered
/// before this returns; the task ends once shutdown has been requested.
pub fn spawn_signal_dispatch(
    controller: ShutdownController,
    daemonized: bool,
) -> Result<JoinHandle<()>> {
    let mut terminate = install(ShutdownSignal::Terminate, daemonized)?;
    let mut interrupt = install(ShutdownSignal::Interrupt, daemonized)?;
    let mut hangup = install(ShutdownSignal::Hangup, daemonized)?;

    Ok(tokio::spawn(async move {
        let token = controller.token();
        loop {
            let intent = tokio::select! {
                () = token.cancelled() => break,
                Some(intent) = recv(terminate.as_mut()) => intent,
                Some(intent) = recv(interrupt.as_mut()) => intent,
                Some(intent) = recv(hangup.as_mut()) => intent,
            };
            controller.dispatch(intent);
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_attached_process_leaves_hangup_alone() {
        assert!(install(ShutdownSignal::Hangup, false).unwrap().is_none());
        let term = install(ShutdownSignal::Terminate, false).unwrap().unwrap();
        assert_eq!(term.intent, ShutdownIntent::Graceful { signal: ShutdownSignal::Terminate });
    }

    #[tokio::test]
    async fn test_daemon_handles_hangup() {
        let hup = install(ShutdownSignal::Hangup, true).unwrap().unwrap();
        assert_eq!(hup.intent, ShutdownIntent::Hangup);
    }

    #[tokio::test]
    async fn test_dispatch_task_ends_after_shutdown() {
        let controller = ShutdownController::new();
        let task = spawn_signal_dispatch(controller.clone(), false).unwrap();

        controller.dispatch(ShutdownIntent::Graceful { signal: ShutdownSignal::Interrupt });
        task.await.unwrap();
    }
}
