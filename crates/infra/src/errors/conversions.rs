//! Conversions from adapter errors into domain errors.

use tokenkeeper_common::auth::OAuthClientError;
use tokenkeeper_common::CommonError;
use tokenkeeper_domain::KeeperError;

use crate::session_store::SessionStoreError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub KeeperError);

impl From<InfraError> for KeeperError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<KeeperError> for InfraError {
    fn from(value: KeeperError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoKeeperError {
    fn into_keeper(self) -> KeeperError;
}

/* -------------------------------------------------------------------------- */
/* OAuthClientError → KeeperError */
/* -------------------------------------------------------------------------- */

impl IntoKeeperError for OAuthClientError {
    fn into_keeper(self) -> KeeperError {
        match self {
            OAuthClientError::ConfigError(message) => KeeperError::Configuration(message),
            OAuthClientError::NoRefreshToken => {
                KeeperError::Protocol("session holds no refresh token".into())
            }
            OAuthClientError::RequestFailed(err) if err.is_timeout() => {
                KeeperError::Protocol("token endpoint timed out".into())
            }
            other => KeeperError::Protocol(other.to_string()),
        }
    }
}

impl From<OAuthClientError> for InfraError {
    fn from(value: OAuthClientError) -> Self {
        InfraError(value.into_keeper())
    }
}

/* -------------------------------------------------------------------------- */
/* CommonError → KeeperError */
/* -------------------------------------------------------------------------- */

impl IntoKeeperError for CommonError {
    fn into_keeper(self) -> KeeperError {
        match self {
            CommonError::Persistence { .. } => KeeperError::Io(self.to_string()),
            CommonError::Serialization { .. } | CommonError::Internal { .. } => {
                KeeperError::SessionDecryption(self.to_string())
            }
        }
    }
}

impl From<CommonError> for InfraError {
    fn from(value: CommonError) -> Self {
        InfraError(value.into_keeper())
    }
}

/* -------------------------------------------------------------------------- */
/* SessionStoreError → KeeperError */
/* -------------------------------------------------------------------------- */

impl IntoKeeperError for SessionStoreError {
    fn into_keeper(self) -> KeeperError {
        match self {
            SessionStoreError::Read { .. } | SessionStoreError::Write { .. } => {
                KeeperError::Io(self.to_string())
            }
            SessionStoreError::AlreadyExists(_) | SessionStoreError::WeakPassword { .. } => {
                KeeperError::Configuration(self.to_string())
            }
            SessionStoreError::Crypto(inner) => inner.into_keeper(),
            SessionStoreError::UnsupportedVersion(_)
            | SessionStoreError::Malformed(_)
            | SessionStoreError::WrongPassword { .. }
            | SessionStoreError::Prompt(_) => KeeperError::SessionDecryption(self.to_string()),
        }
    }
}

impl From<SessionStoreError> for InfraError {
    fn from(value: SessionStoreError) -> Self {
        InfraError(value.into_keeper())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tokenkeeper_common::auth::OAuthError;

    use super::*;

    #[test]
    fn oauth_error_body_maps_to_protocol() {
        let err = OAuthClientError::OAuthError(OAuthError {
            error: "invalid_grant".into(),
            error_description: Some("token revoked".into()),
        });
        let mapped: KeeperError = InfraError::from(err).into();
        match mapped {
            KeeperError::Protocol(message) => assert!(message.contains("invalid_grant")),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }

    #[test]
    fn oauth_config_error_maps_to_configuration() {
        let mapped: KeeperError =
            InfraError::from(OAuthClientError::ConfigError("no challenge".into())).into();
        assert!(matches!(mapped, KeeperError::Configuration(_)));
    }

    #[test]
    fn missing_refresh_token_is_protocol_error() {
        let mapped: KeeperError = InfraError::from(OAuthClientError::NoRefreshToken).into();
        assert!(matches!(mapped, KeeperError::Protocol(_)));
    }

    #[test]
    fn persistence_maps_to_io_and_cipher_failure_to_decryption() {
        let io: KeeperError = InfraError::from(CommonError::persistence("disk full")).into();
        assert!(matches!(io, KeeperError::Io(_)));

        let cipher: KeeperError =
            InfraError::from(CommonError::internal_with_context("aead::Error", "decrypt")).into();
        assert!(matches!(cipher, KeeperError::SessionDecryption(_)));
    }

    #[test]
    fn session_store_errors_keep_their_kind() {
        let exists: KeeperError =
            InfraError::from(SessionStoreError::AlreadyExists(PathBuf::from("/tmp/s"))).into();
        assert!(matches!(exists, KeeperError::Configuration(_)));

        let wrong: KeeperError =
            InfraError::from(SessionStoreError::WrongPassword { attempts: 3 }).into();
        assert!(matches!(wrong, KeeperError::SessionDecryption(_)));

        let read: KeeperError = InfraError::from(SessionStoreError::Read {
            path: PathBuf::from("/tmp/s"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        })
        .into();
        assert!(matches!(read, KeeperError::Io(_)));
    }
}
