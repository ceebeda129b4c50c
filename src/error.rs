//! Error types for the OIDC store
//!
//! Three kinds of failure exist: configuration errors raised while the store
//! or a client is being set up, errors surfaced by the wrapped OIDC client,
//! and action-level errors that bundle the two for callers of the store.

use thiserror::Error;

/// Configuration errors raised synchronously at setup time
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required client setting is absent or empty
    #[error("Required oidc setting {0} missing for creating UserManager")]
    MissingSetting(&'static str),

    /// A client setting is present but has the wrong shape
    #[error("Invalid oidc setting {name}: {reason}")]
    InvalidSetting { name: String, reason: String },

    /// The settings file could not be read or parsed
    #[error("Failed to load settings: {0}")]
    Load(String),
}

/// Errors surfaced by the wrapped OIDC client
///
/// The client owns the protocol, so its failures are carried as messages.
/// The message is what ends up in the store's `error` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClientError {
    message: String,
}

impl ClientError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for ClientError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ClientError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Errors returned by store actions and standalone callbacks
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("OIDC client error: {0}")]
    Client(#[from] ClientError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Silent sign-out needs a browser window to host the iframe
    #[error("Navigation error: {0}")]
    Navigation(String),
}

impl StoreError {
    /// The message recorded in the store when this error is relayed
    #[must_use]
    pub fn relay_message(&self) -> String {
        match self {
            StoreError::Client(err) => err.message().to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_setting_message_names_the_field() {
        let err = ConfigError::MissingSetting("scope");
        assert_eq!(
            err.to_string(),
            "Required oidc setting scope missing for creating UserManager"
        );
    }

    #[test]
    fn test_relay_message_uses_raw_client_message() {
        let err = StoreError::from(ClientError::new("login_required"));
        assert_eq!(err.relay_message(), "login_required");
        assert_eq!(err.to_string(), "OIDC client error: login_required");
    }
}
