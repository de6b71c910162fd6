//! Encrypted session file
//!
//! The session (resolved provider registration, client credentials and the
//! current token) is sealed with AES-256-GCM under a key derived from the
//! session password with Argon2. On disk it is a small JSON envelope:
//!
//! ```json
//! { "version": 1, "kdf_salt": "<argon2 salt>", "payload": "<base64 EncryptedData>" }
//! ```
//!
//! The derived key stays in memory for the life of the process so the
//! session can be rewritten after every refresh without asking again.

use std::path::{Path, PathBuf};

use inquire::{Password, PasswordDisplayMode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokenkeeper_common::auth::TokenSet;
use tokenkeeper_common::crypto::EncryptionService;
use tokenkeeper_common::CommonError;
use tokenkeeper_domain::constants::{
    ENV_SESSION_PASSWORD, MIN_SESSION_PASSWORD_LEN, SESSION_UNLOCK_ATTEMPTS,
};
use tokenkeeper_domain::{ClientCredentials, ProviderRegistration, Result};
use tracing::{debug, info, warn};

use crate::errors::InfraError;

const ENVELOPE_VERSION: u32 = 1;

/// Errors raised while reading or writing the session file
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session file {0} already exists (use --force to replace it)")]
    AlreadyExists(PathBuf),

    #[error("cannot read session file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write session file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported session file version {0}")]
    UnsupportedVersion(u32),

    #[error("session file is malformed: {0}")]
    Malformed(String),

    #[error("wrong session password ({attempts} attempt(s))")]
    WrongPassword { attempts: usize },

    #[error("session password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("password prompt failed: {0}")]
    Prompt(String),

    #[error(transparent)]
    Crypto(CommonError),
}

/// Everything needed to resume refreshing after a restart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Fully resolved provider registration
    pub registration: ProviderRegistration,
    pub client: ClientCredentials,
    pub token: TokenSet,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    kdf_salt: String,
    payload: String,
}

/// Supplies session passwords
pub trait PasswordSource {
    /// Password for a new session file, already confirmed by the user
    fn new_password(&mut self) -> Result<String>;

    /// Password for an existing session file; `attempt` counts from 1
    fn existing_password(&mut self, attempt: usize) -> Result<String>;

    /// How many wrong passwords are tolerated before giving up
    fn max_attempts(&self) -> usize {
        SESSION_UNLOCK_ATTEMPTS
    }
}

/// Terminal prompts via `inquire`
#[derive(Debug, Default)]
pub struct InteractivePasswords;

impl PasswordSource for InteractivePasswords {
    fn new_password(&mut self) -> Result<String> {
        loop {
            let password = prompt("New session password:")?;
            if password.chars().count() < MIN_SESSION_PASSWORD_LEN {
                warn!(
                    event = "session.password_too_short",
                    min = MIN_SESSION_PASSWORD_LEN,
                    "password must be at least {MIN_SESSION_PASSWORD_LEN} characters"
                );
                continue;
            }
            if prompt("Confirm session password:")? == password {
                return Ok(password);
            }
            warn!(event = "session.password_mismatch", "passwords do not match");
        }
    }

    fn existing_password(&mut self, _attempt: usize) -> Result<String> {
        prompt("Session password:")
    }
}

fn prompt(message: &str) -> Result<String> {
    Password::new(message)
        .with_display_mode(PasswordDisplayMode::Hidden)
        .without_confirmation()
        .prompt()
        .map_err(|e| InfraError::from(SessionStoreError::Prompt(e.to_string())).into())
}

/// A single password taken from the environment
#[derive(Debug)]
pub struct FixedPassword(String);

impl FixedPassword {
    #[must_use]
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    /// `TOKENKEEPER_SESSION_PASSWORD`, if set
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var(ENV_SESSION_PASSWORD).ok().map(Self)
    }
}

impl PasswordSource for FixedPassword {
    fn new_password(&mut self) -> Result<String> {
        Ok(self.0.clone())
    }

    fn existing_password(&mut self, _attempt: usize) -> Result<String> {
        Ok(self.0.clone())
    }

    fn max_attempts(&self) -> usize {
        1
    }
}

/// The environment password if present, else terminal prompts
#[must_use]
pub fn default_password_source() -> Box<dyn PasswordSource> {
    match FixedPassword::from_env() {
        Some(fixed) => {
            debug!(event = "session.password_from_env");
            Box::new(fixed)
        }
        None => Box::new(InteractivePasswords),
    }
}

/// Handle on an unlocked session file
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    cipher: EncryptionService,
}

impl SessionStore {
    /// Fail if a session already lives at `path` and `force` is not set.
    ///
    /// Checked before any password prompt.
    pub fn ensure_creatable(path: &Path, force: bool) -> Result<()> {
        if path.exists() && !force {
            return Err(InfraError::from(SessionStoreError::AlreadyExists(path.to_path_buf())).into());
        }
        Ok(())
    }

    /// Prepare a new session file at `path`. Nothing is written until
    /// [`Self::save`].
    pub fn create(path: &Path, source: &mut dyn PasswordSource) -> Result<Self> {
        let password = source.new_password()?;
        if password.chars().count() < MIN_SESSION_PASSWORD_LEN {
            return Err(InfraError::from(SessionStoreError::WeakPassword {
                min: MIN_SESSION_PASSWORD_LEN,
            })
            .into());
        }

        let cipher = EncryptionService::from_password_with_salt(&password, None)
            .map_err(SessionStoreError::Crypto)
            .map_err(InfraError::from)?;
        Ok(Self { path: path.to_path_buf(), cipher })
    }

    /// Unlock the session file at `path`.
    ///
    /// The file is read and its envelope checked before the first prompt.
    /// Each wrong password is logged; after the source's attempt limit the
    /// open fails.
    pub fn open(path: &Path, source: &mut dyn PasswordSource) -> Result<(Self, Session)> {
        let envelope = read_envelope(path).map_err(InfraError::from)?;
        let attempts = source.max_attempts().max(1);

        for attempt in 1..=attempts {
            let password = source.existing_password(attempt)?;
            let cipher = EncryptionService::from_password_with_salt(&password, Some(&envelope.kdf_salt))
                .map_err(SessionStoreError::Crypto)
                .map_err(InfraError::from)?;

            match unseal(&cipher, &envelope.payload) {
                Ok(session) => {
                    info!(event = "session.opened", path = %path.display());
                    return Ok((Self { path: path.to_path_buf(), cipher }, session));
                }
                Err(SessionStoreError::WrongPassword { .. }) => {
                    warn!(event = "session.unlock_failed", attempt, of = attempts);
                }
                Err(other) => return Err(InfraError::from(other).into()),
            }
        }

        Err(InfraError::from(SessionStoreError::WrongPassword { attempts }).into())
    }

    /// Seal `session` and atomically replace the session file.
    pub fn save(&self, session: &Session) -> Result<()> {
        let kdf_salt = self
            .cipher
            .password_salt()
            .ok_or_else(|| SessionStoreError::Malformed("session key has no salt".into()))
            .map_err(InfraError::from)?
            .to_string();

        let plaintext = serde_json::to_vec(session)
            .map_err(|e| SessionStoreError::Crypto(e.into()))
            .map_err(InfraError::from)?;
        let payload = self
            .cipher
            .encrypt_to_string(&plaintext)
            .map_err(SessionStoreError::Crypto)
            .map_err(InfraError::from)?;

        let envelope = Envelope { version: ENVELOPE_VERSION, kdf_salt, payload };
        let bytes = serde_json::to_vec_pretty(&envelope)
            .map_err(|e| SessionStoreError::Crypto(e.into()))
            .map_err(InfraError::from)?;

        crate::fs::write_atomic(&self.path, &bytes)
            .map_err(|source| SessionStoreError::Write { path: self.path.clone(), source })
            .map_err(InfraError::from)?;

        debug!(event = "session.saved", path = %self.path.display());
        Ok(())
    }
}

fn read_envelope(path: &Path) -> std::result::Result<Envelope, SessionStoreError> {
    let raw = std::fs::read(path)
        .map_err(|source| SessionStoreError::Read { path: path.to_path_buf(), source })?;
    let envelope: Envelope =
        serde_json::from_slice(&raw).map_err(|e| SessionStoreError::Malformed(e.to_string()))?;

    if envelope.version != ENVELOPE_VERSION {
        return Err(SessionStoreError::UnsupportedVersion(envelope.version));
    }
    Ok(envelope)
}

fn unseal(
    cipher: &EncryptionService,
    payload: &str,
) -> std::result::Result<Session, SessionStoreError> {
    let plaintext = cipher.decrypt_from_string(payload).map_err(|err| match &err {
        CommonError::Internal { context: Some(context), .. } if context == "decrypt" => {
            SessionStoreError::WrongPassword { attempts: 1 }
        }
        _ => SessionStoreError::Malformed(err.to_string()),
    })?;

    serde_json::from_slice(&plaintext).map_err(|e| SessionStoreError::Malformed(e.to_string()))
}
