//! Configuration management for SDU Chat
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//!
//! The base URL, OAuth start URL and callback scheme are required. A
//! configuration missing any of them fails [`Config::validate`], which the
//! binary treats as a fatal startup condition.

use crate::error::{Result, SduChatError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Main configuration structure for SDU Chat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API settings
    #[serde(default)]
    pub api: ApiConfig,
    /// OAuth and credential storage settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Conversation engine settings
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Remote API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is resolved against
    #[serde(default)]
    pub base_url: String,

    /// Optional credential for the public send endpoint. A bare token is
    /// sent as `Bearer <token>`; a value with a scheme is sent verbatim.
    #[serde(default)]
    pub static_bearer: Option<String>,

    /// Per-request timeout (seconds)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    60
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            static_bearer: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// OAuth configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// URL that starts the Google OAuth flow on the server
    #[serde(default)]
    pub oauth_start_url: String,

    /// Scheme of the redirect URL carrying the authorization code
    ///
    /// `http` selects a loopback listener on `redirect_port`; any other
    /// scheme (e.g. `sduchat`) asks the user to paste the redirected URL.
    #[serde(default)]
    pub callback_scheme: String,

    /// Loopback port used when `callback_scheme` is `http`
    #[serde(default = "default_redirect_port")]
    pub redirect_port: u16,

    /// Keyring service name the access token is stored under
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,
}

fn default_redirect_port() -> u16 {
    8765
}

fn default_keyring_service() -> String {
    "sduchat".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            oauth_start_url: String::new(),
            callback_scheme: String::new(),
            redirect_port: default_redirect_port(),
            keyring_service: default_keyring_service(),
        }
    }
}

/// Which endpoint carries the first message of a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FirstMessageRoute {
    /// Unauthenticated `chats/send-message` with lenient decoding
    #[default]
    Public,
    /// Authenticated `messages/first`, which creates a server-side chat
    Authenticated,
}

/// Conversation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Delay between revealed characters (milliseconds)
    #[serde(default = "default_reveal_delay_ms")]
    pub reveal_delay_ms: u64,

    /// Endpoint used while the session has no chat yet
    #[serde(default)]
    pub first_message_route: FirstMessageRoute,

    /// Page size used when loading chat history
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_reveal_delay_ms() -> u64 {
    12
}

fn default_page_size() -> u32 {
    30
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            reveal_delay_ms: default_reveal_delay_ms(),
            first_message_route: FirstMessageRoute::default(),
            page_size: default_page_size(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error by itself: the defaults are used and
    /// the required values may still come from the environment or the CLI.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SduChatError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| SduChatError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("SDUCHAT_BASE_URL") {
            self.api.base_url = base_url;
        }

        if let Ok(bearer) = std::env::var("SDUCHAT_STATIC_BEARER") {
            self.api.static_bearer = Some(bearer).filter(|b| !b.trim().is_empty());
        }

        if let Ok(timeout) = std::env::var("SDUCHAT_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.api.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid SDUCHAT_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(start_url) = std::env::var("SDUCHAT_OAUTH_START_URL") {
            self.auth.oauth_start_url = start_url;
        }

        if let Ok(scheme) = std::env::var("SDUCHAT_URL_SCHEME") {
            self.auth.callback_scheme = scheme;
        }

        if let Ok(port) = std::env::var("SDUCHAT_REDIRECT_PORT") {
            if let Ok(value) = port.parse() {
                self.auth.redirect_port = value;
            } else {
                tracing::warn!("Invalid SDUCHAT_REDIRECT_PORT: {}", port);
            }
        }

        if let Ok(delay) = std::env::var("SDUCHAT_REVEAL_DELAY_MS") {
            if let Ok(value) = delay.parse() {
                self.chat.reveal_delay_ms = value;
            } else {
                tracing::warn!("Invalid SDUCHAT_REVEAL_DELAY_MS: {}", delay);
            }
        }

        if let Ok(route) = std::env::var("SDUCHAT_FIRST_MESSAGE_ROUTE") {
            self.chat.first_message_route = match route.to_lowercase().as_str() {
                "public" => FirstMessageRoute::Public,
                "authenticated" => FirstMessageRoute::Authenticated,
                _ => {
                    tracing::warn!("Invalid first message route: {}, using default", route);
                    FirstMessageRoute::default()
                }
            };
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(base_url) = &cli.base_url {
            tracing::debug!(base_url = %base_url, "CLI override: --base-url");
            self.api.base_url = base_url.clone();
        }
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns [`SduChatError::Config`] if a required value is missing or
    /// malformed
    pub fn validate(&self) -> Result<()> {
        let base = Url::parse(self.api.base_url.trim()).map_err(|e| {
            SduChatError::Config(format!(
                "api.base_url is invalid or missing ({:?}): {}",
                self.api.base_url, e
            ))
        })?;
        if !base.scheme().starts_with("http") || base.host().is_none() {
            return Err(SduChatError::Config(format!(
                "api.base_url must be an http(s) URL with a host, got {}",
                self.api.base_url
            ))
            .into());
        }

        Url::parse(self.auth.oauth_start_url.trim()).map_err(|e| {
            SduChatError::Config(format!(
                "auth.oauth_start_url is invalid or missing ({:?}): {}",
                self.auth.oauth_start_url, e
            ))
        })?;

        let scheme = self.auth.callback_scheme.trim();
        let valid_scheme = scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !valid_scheme {
            return Err(SduChatError::Config(format!(
                "auth.callback_scheme is invalid or missing: {:?}",
                self.auth.callback_scheme
            ))
            .into());
        }

        if self.api.timeout_seconds == 0 {
            return Err(
                SduChatError::Config("api.timeout_seconds must be positive".to_string()).into(),
            );
        }

        if self.chat.page_size == 0 {
            return Err(SduChatError::Config("chat.page_size must be positive".to_string()).into());
        }

        Ok(())
    }
}
