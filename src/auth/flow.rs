//! Browser-based Google sign-in
//!
//! The server drives the OAuth exchange with Google; the client only has to
//! open the server's start URL in a browser and capture the redirect that
//! carries the authorization `code`.
//!
//! # Flow overview
//!
//! 1. For `http` callbacks, bind a loopback listener on the redirect port.
//! 2. Print the start URL and try to open it in the system browser.
//! 3. Obtain the redirect URL, either from the loopback listener or by
//!    asking the user to paste it (custom schemes such as
//!    `sduchat://oauth?code=...`).
//! 4. Extract `code`, or fail with the `error` the server reported.

use std::io::Write as _;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use url::Url;

use crate::config::AuthConfig;
use crate::error::{Result, SduChatError};

/// Source of OAuth authorization codes.
///
/// [`BrowserAuthFlow`] is the interactive implementation; tests supply
/// canned codes or failures.
#[async_trait]
pub trait AuthorizationFlow: Send + Sync {
    /// Runs the flow and returns the authorization code.
    ///
    /// # Errors
    ///
    /// Returns [`SduChatError::Authentication`] when the user cancels, the
    /// provider reports an error, or the redirect carries no code.
    async fn authorize(&self) -> Result<String>;
}

/// Interactive flow that opens the system browser.
#[derive(Debug, Clone)]
pub struct BrowserAuthFlow {
    start_url: Url,
    callback_scheme: String,
    redirect_port: u16,
}

impl BrowserAuthFlow {
    /// Builds the flow from validated configuration.
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let start_url = Url::parse(config.oauth_start_url.trim()).map_err(|e| {
            SduChatError::Config(format!("invalid auth.oauth_start_url: {}", e))
        })?;
        Ok(Self {
            start_url,
            callback_scheme: config.callback_scheme.trim().to_ascii_lowercase(),
            redirect_port: config.redirect_port,
        })
    }

    fn uses_loopback(&self) -> bool {
        self.callback_scheme == "http"
    }

    /// Attempts to open `url` in the user's default browser.
    ///
    /// Errors are ignored; the URL is also printed so the user can copy it.
    fn try_open_browser(url: &str) {
        #[cfg(target_os = "macos")]
        {
            let _ = std::process::Command::new("open").arg(url).spawn();
        }
        #[cfg(target_os = "linux")]
        {
            let _ = std::process::Command::new("xdg-open").arg(url).spawn();
        }
        #[cfg(target_os = "windows")]
        {
            let _ = std::process::Command::new("cmd")
                .args(["/C", "start", "", url])
                .spawn();
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            let _ = url;
        }
    }

    /// Accepts one connection on `listener` and returns the full redirect URL.
    async fn accept_loopback(&self, listener: tokio::net::TcpListener) -> Result<String> {
        let (stream, _peer) = listener.accept().await.map_err(|e| {
            SduChatError::Authentication(format!("failed to accept OAuth callback: {}", e))
        })?;

        let (read_half, mut write_half) = stream.into_split();
        let mut lines = BufReader::new(read_half).lines();
        let mut request_line = String::new();
        while let Some(line) = lines.next_line().await.map_err(|e| {
            SduChatError::Authentication(format!("failed to read OAuth callback: {}", e))
        })? {
            if line.is_empty() {
                break;
            }
            if request_line.is_empty() {
                request_line = line;
            }
        }

        let response = "HTTP/1.1 200 OK\r\nContent-Type: text/plain; charset=utf-8\r\nConnection: close\r\n\r\nSign-in complete. You may close this tab.";
        let _ = write_half.write_all(response.as_bytes()).await;

        // "GET /oauth?code=... HTTP/1.1"
        let path = request_line.split_whitespace().nth(1).unwrap_or("/");
        Ok(format!("http://127.0.0.1:{}{}", self.redirect_port, path))
    }

    /// Asks the user to paste the URL the browser was redirected to.
    async fn prompt_for_callback(&self) -> Result<String> {
        let scheme = self.callback_scheme.clone();
        tokio::task::spawn_blocking(move || -> Result<String> {
            eprint!(
                "After signing in, paste the {}://... address the browser opened: ",
                scheme
            );
            let _ = std::io::stderr().flush();
            let mut line = String::new();
            let read = std::io::stdin().read_line(&mut line)?;
            if read == 0 || line.trim().is_empty() {
                return Err(SduChatError::Authentication("sign-in cancelled".to_string()).into());
            }
            Ok(line.trim().to_string())
        })
        .await
        .map_err(|e| SduChatError::Authentication(format!("callback prompt failed: {}", e)))?
    }
}

#[async_trait]
impl AuthorizationFlow for BrowserAuthFlow {
    async fn authorize(&self) -> Result<String> {
        let listener = if self.uses_loopback() {
            let listener = tokio::net::TcpListener::bind(("127.0.0.1", self.redirect_port))
                .await
                .map_err(|e| {
                    SduChatError::Authentication(format!(
                        "failed to bind redirect listener on port {}: {}",
                        self.redirect_port, e
                    ))
                })?;
            Some(listener)
        } else {
            None
        };

        eprintln!(
            "Open the following URL in your browser to sign in:\n{}",
            self.start_url
        );
        Self::try_open_browser(self.start_url.as_str());

        let callback = match listener {
            Some(listener) => self.accept_loopback(listener).await?,
            None => self.prompt_for_callback().await?,
        };
        tracing::debug!("Received OAuth callback");

        parse_callback(&callback, &self.callback_scheme)
    }
}

/// Extracts the authorization code from a redirect URL.
///
/// The URL scheme must match `expected_scheme` (case-insensitive). A `code`
/// query parameter wins; otherwise an `error` parameter is reported.
///
/// # Examples
///
/// ```
/// use sduchat::auth::flow::parse_callback;
///
/// let code = parse_callback("sduchat://oauth?code=abc%20123", "sduchat").unwrap();
/// assert_eq!(code, "abc 123");
/// assert!(parse_callback("sduchat://oauth?error=access_denied", "sduchat").is_err());
/// ```
pub fn parse_callback(callback: &str, expected_scheme: &str) -> Result<String> {
    let url = Url::parse(callback.trim()).map_err(|e| {
        SduChatError::Authentication(format!("invalid callback URL: {}", e))
    })?;

    if !url.scheme().eq_ignore_ascii_case(expected_scheme) {
        return Err(SduChatError::Authentication(format!(
            "unexpected callback scheme {:?}, expected {:?}",
            url.scheme(),
            expected_scheme
        ))
        .into());
    }

    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" if !value.is_empty() => return Ok(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    Err(match error {
        Some(err) => SduChatError::Authentication(format!("provider returned error: {}", err)),
        None => SduChatError::Authentication("authorization code missing from callback".into()),
    }
    .into())
}
