//! Startup sequence: setup, exclusivity, detaching, then the service

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokenkeeper_core::{
    Orchestrator, OrchestratorConfig, ProviderRegistry, RunOutcome, ShutdownController,
};
use tokenkeeper_domain::{KeeperConfig, KeeperError, ProviderRegistration};
use tokenkeeper_infra::authorize::{
    authorize_new_session, prompt_client_secret, resolve_client_credentials, stdin_lines,
};
use tokenkeeper_infra::daemon::{self, DetachedProcess};
use tokenkeeper_infra::session_store::default_password_source;
use tokenkeeper_infra::signals::spawn_signal_dispatch;
use tokenkeeper_infra::{
    config, PasswordSource, PidLock, Session, SessionStore, SessionTokenManager,
};
use tracing::{debug, info};

use crate::args::Args;
use crate::terminal::{StdoutEcho, TerminalPrompt};

/// Paths from the command line, made absolute before the daemon leaves
/// the working directory
#[derive(Debug)]
struct Paths {
    session: PathBuf,
    pidfile: Option<PathBuf>,
    socket: Option<PathBuf>,
    file: Option<PathBuf>,
    log: Option<PathBuf>,
}

impl Paths {
    fn from_args(args: &Args) -> Result<Self> {
        let absolute = |path: &Option<PathBuf>| -> Result<Option<PathBuf>> {
            Ok(path.as_deref().map(daemon::absolutize).transpose()?)
        };
        Ok(Self {
            session: daemon::absolutize(&args.session_file)?,
            pidfile: absolute(&args.pidfile)?,
            socket: absolute(&args.socket)?,
            file: absolute(&args.file)?,
            log: absolute(&args.log_file)?,
        })
    }
}

/// Run the daemon to completion.
///
/// Returns the shutdown notice to print, if a signal ended the run.
pub fn run(args: &Args) -> Result<Option<String>> {
    let config = config::load(args.config.as_deref()).context("cannot load configuration")?;
    let registry = ProviderRegistry::builtin().with_declared(config.providers.iter().cloned());
    registry.validate().context("invalid provider configuration")?;
    let paths = Paths::from_args(args)?;
    let threshold_secs = args.threshold.unwrap_or(config.refresh_threshold_seconds);

    let mut passwords = default_password_source();
    let (store, session) = open_session(
        args,
        &config,
        &registry,
        &paths,
        passwords.as_mut(),
        &mut prompt_client_secret,
    )?;

    let mut lock = paths.pidfile.as_deref().map(PidLock::acquire).transpose()?;

    let detached = match &paths.log {
        Some(log) => {
            let log = daemon::open_log_file(log)?;
            let detached = daemon::daemonize(&log)?;
            if let Some(lock) = lock.as_mut() {
                lock.record_current_pid()?;
            }
            Some(detached)
        }
        None => None,
    };

    let service = OrchestratorConfig {
        socket_path: paths.socket,
        file_path: paths.file,
        threshold_secs,
        debug: args.debug,
        daemonized: detached.is_some(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start service runtime")?;
    let outcome = runtime.block_on(serve(store, session, service, detached))?;
    drop(lock);

    Ok(match outcome {
        RunOutcome::Shutdown(intent) => Some(intent.notice()),
        RunOutcome::Cancelled => None,
    })
}

type SecretPrompt<'a> = &'a mut dyn FnMut() -> tokenkeeper_domain::Result<String>;

/// Pre-check the pidfile, then unlock or create the session.
///
/// Nothing is asked of the user while another instance holds the pidfile.
fn open_session(
    args: &Args,
    config: &KeeperConfig,
    registry: &ProviderRegistry,
    paths: &Paths,
    passwords: &mut dyn PasswordSource,
    client_secret: SecretPrompt<'_>,
) -> Result<(SessionStore, Session)> {
    if let Some(pidfile) = &paths.pidfile {
        PidLock::check_available(pidfile)?;
    }

    if args.authorize {
        authorize(args, config, registry, &paths.session, passwords, client_secret)
    } else {
        Ok(SessionStore::open(&paths.session, passwords)?)
    }
}

/// Create a new session: provider, client credentials, password, then the
/// browser round trip. The session is saved before returning.
fn authorize(
    args: &Args,
    config: &KeeperConfig,
    registry: &ProviderRegistry,
    path: &Path,
    passwords: &mut dyn PasswordSource,
    client_secret: SecretPrompt<'_>,
) -> Result<(SessionStore, Session)> {
    SessionStore::ensure_creatable(path, args.force)?;

    let registration = resolve_provider(registry, args.provider.as_deref())?;
    let credentials =
        resolve_client_credentials(&registration, args.client_id.clone(), || client_secret())?;
    let store = SessionStore::create(path, passwords)?;
    let port = args.port.unwrap_or(config.callback_port);

    // Dropped before any fork; the stdin reader is a plain thread so it
    // does not hold the runtime open.
    let setup = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("cannot start setup runtime")?;
    let session = setup.block_on(async {
        let mut lines = stdin_lines();
        authorize_new_session(registration, credentials, port, &mut lines, &TerminalPrompt).await
    })?;
    drop(setup);

    store.save(&session)?;
    info!(event = "session.created", path = %path.display());
    Ok((store, session))
}

fn resolve_provider(registry: &ProviderRegistry, name: Option<&str>) -> Result<ProviderRegistration> {
    let Some(name) = name else {
        return Err(KeeperError::Configuration(format!(
            "--provider is required with --authorize (one of: {})",
            registry.names().join(", ")
        ))
        .into());
    };
    if !registry.contains(name) {
        return Err(KeeperError::Configuration(format!(
            "unknown provider '{name}' (one of: {})",
            registry.names().join(", ")
        ))
        .into());
    }
    Ok(registry.resolve(name)?)
}

async fn serve(
    store: SessionStore,
    session: Session,
    config: OrchestratorConfig,
    detached: Option<DetachedProcess>,
) -> Result<RunOutcome> {
    let shutdown = ShutdownController::new();
    let signals = spawn_signal_dispatch(shutdown.clone(), config.daemonized)?;

    // Built here so the HTTP client lives on the service runtime
    let manager = SessionTokenManager::from_session(store, session)?;
    let orchestrator = Orchestrator::new(Arc::new(manager), Arc::new(StdoutEcho), config);

    if let Some(detached) = detached {
        detached.notify_ready()?;
    }

    let result = orchestrator.run(&shutdown).await;

    shutdown.token().cancel();
    if let Err(err) = signals.await {
        debug!(event = "signals.dispatch_failed", error = %err);
    }
    Ok(result?)
}
