//! Error types for SDU Chat
//!
//! This module defines all error types used throughout the client,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for SDU Chat operations
///
/// The first four variants form the transport taxonomy surfaced by the API
/// client. The remaining variants cover configuration, authentication,
/// credential storage and wrapped library errors.
#[derive(Error, Debug)]
pub enum SduChatError {
    /// Structured error payload returned with a non-2xx status
    #[error("Server error ({error}): {message}")]
    Server {
        /// Short error code reported by the server
        error: String,
        /// Human-readable error description
        message: String,
        /// Server timestamp (epoch millis or seconds, as sent)
        timestamp: i64,
    },

    /// Non-2xx response whose body could not be decoded as an error payload
    #[error("Transport error: HTTP {status}")]
    Transport {
        /// Raw HTTP status code
        status: u16,
    },

    /// 2xx response whose body matched none of the known shapes
    #[error("Decode error: {0}")]
    Decode(String),

    /// Operation aborted by the user
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication errors (OAuth callback, code exchange)
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Credential store errors not covered by the keyring backend
    #[error("Credential store error: {0}")]
    CredentialStore(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors (connection, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

impl SduChatError {
    /// Returns `true` if `err` wraps [`SduChatError::Cancelled`].
    pub fn is_cancelled(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<SduChatError>(),
            Some(SduChatError::Cancelled)
        )
    }
}

/// Result type alias for SDU Chat operations
///
/// Uses `anyhow::Error` so callers can attach context while still being able
/// to downcast to [`SduChatError`] when they need to branch on the kind.
pub type Result<T> = anyhow::Result<T>;
