//! Login state
//!
//! [`SessionManager`] owns the user's authentication state and publishes it
//! through a `watch` channel so any presentation layer can follow along.
//!
//! ```text
//!   LoggedOut --login()--> Authenticating --code exchanged--> LoggedIn
//!       ^                        |                               |
//!       +------- failure --------+                               |
//!       +------------------------- logout() --------------------+
//! ```

use std::sync::Arc;

use tokio::sync::watch;

use crate::api::ApiClient;
use crate::auth::flow::AuthorizationFlow;
use crate::error::{Result, SduChatError};

/// Authentication state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No access token stored
    LoggedOut,
    /// OAuth flow in progress
    Authenticating,
    /// Access token stored
    LoggedIn,
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AuthState::LoggedOut => "logged out",
            AuthState::Authenticating => "authenticating",
            AuthState::LoggedIn => "logged in",
        };
        f.write_str(label)
    }
}

/// Drives sign-in and sign-out.
pub struct SessionManager {
    api: Arc<ApiClient>,
    flow: Arc<dyn AuthorizationFlow>,
    state: watch::Sender<AuthState>,
}

impl SessionManager {
    /// Creates a manager whose initial state reflects the stored token.
    pub fn new(api: Arc<ApiClient>, flow: Arc<dyn AuthorizationFlow>) -> Self {
        let initial = if api.token().is_some() {
            AuthState::LoggedIn
        } else {
            AuthState::LoggedOut
        };
        tracing::debug!(state = %initial, "Probed credential store");
        let (state, _) = watch::channel(initial);
        Self { api, flow, state }
    }

    /// Current state.
    pub fn state(&self) -> AuthState {
        *self.state.borrow()
    }

    /// `true` when an access token is stored.
    pub fn is_logged_in(&self) -> bool {
        self.state() == AuthState::LoggedIn
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    /// Runs the OAuth flow and exchanges the resulting code for a token.
    ///
    /// On failure the state returns to [`AuthState::LoggedOut`] and the
    /// error is returned; nothing else is affected.
    ///
    /// # Errors
    ///
    /// Returns [`SduChatError::Authentication`] if a login is already in
    /// progress, or the flow/exchange error otherwise.
    pub async fn login(&self) -> Result<()> {
        let started = self.state.send_if_modified(|state| {
            if *state == AuthState::Authenticating {
                false
            } else {
                *state = AuthState::Authenticating;
                true
            }
        });
        if !started {
            return Err(
                SduChatError::Authentication("login already in progress".to_string()).into(),
            );
        }

        let result = async {
            let code = self.flow.authorize().await?;
            self.api.auth_google(&code).await
        }
        .await;

        match result {
            Ok(_) => {
                tracing::info!("Login succeeded");
                self.state.send_replace(AuthState::LoggedIn);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Auth error: {:#}", e);
                self.state.send_replace(AuthState::LoggedOut);
                Err(e)
            }
        }
    }

    /// Forgets the stored token.
    pub fn logout(&self) -> Result<()> {
        let result = self.api.set_token(None);
        self.state.send_replace(AuthState::LoggedOut);
        tracing::info!("Logged out");
        result
    }
}
