//! Common error types shared by the crypto and auth modules
//!
//! Module-specific errors (`OAuthClientError`, the session store errors in
//! `tokenkeeper-infra`) compose with [`CommonError`] instead of duplicating
//! these variants.

use std::fmt;

/// Standard result type using CommonError
pub type CommonResult<T> = Result<T, CommonError>;

/// Common error variants that appear across multiple modules
#[derive(Debug, Clone)]
pub enum CommonError {
    /// Serialization or deserialization errors
    Serialization { message: String, format: Option<String> },

    /// Data persistence errors (file I/O)
    Persistence { message: String, operation: Option<String> },

    /// Internal errors (key derivation, cipher failures)
    Internal { message: String, context: Option<String> },
}

impl CommonError {
    /// Create a serialization error for a specific format
    pub fn serialization_format<F: Into<String>, S: Into<String>>(format: F, message: S) -> Self {
        Self::Serialization { message: message.into(), format: Some(format.into()) }
    }

    /// Create a persistence error
    pub fn persistence<S: Into<String>>(message: S) -> Self {
        Self::Persistence { message: message.into(), operation: None }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), context: None }
    }

    /// Create an internal error with context
    pub fn internal_with_context<S: Into<String>, C: Into<String>>(message: S, context: C) -> Self {
        Self::Internal { message: message.into(), context: Some(context.into()) }
    }
}

impl fmt::Display for CommonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialization { message, format } => {
                if let Some(format) = format {
                    write!(f, "{} serialization error: {}", format, message)
                } else {
                    write!(f, "Serialization error: {}", message)
                }
            }
            Self::Persistence { message, operation } => {
                if let Some(operation) = operation {
                    write!(f, "Persistence error during '{}': {}", operation, message)
                } else {
                    write!(f, "Persistence error: {}", message)
                }
            }
            Self::Internal { message, context } => {
                if let Some(context) = context {
                    write!(f, "Internal error ({}): {}", context, message)
                } else {
                    write!(f, "Internal error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for CommonError {}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization_format("JSON", err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_format() {
        let err = CommonError::serialization_format("JSON", "trailing comma");
        assert_eq!(err.to_string(), "JSON serialization error: trailing comma");
    }

    #[test]
    fn test_display_internal_with_context() {
        let err = CommonError::internal_with_context("tag mismatch", "decrypt");
        assert_eq!(err.to_string(), "Internal error (decrypt): tag mismatch");
        assert_eq!(CommonError::internal("boom").to_string(), "Internal error: boom");
    }

    #[test]
    fn test_from_serde_json_error() {
        let err: CommonError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, CommonError::Serialization { format: Some(ref f), .. } if f == "JSON"));
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: CommonError = io.into();
        assert!(matches!(err, CommonError::Persistence { .. }));
        assert!(err.to_string().contains("denied"));
    }
}
