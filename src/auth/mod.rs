//! Authentication
//!
//! # Module Layout
//!
//! - [`flow`]        -- browser-based Google sign-in returning an
//!   authorization code
//! - [`session`]     -- login state machine (logged out / authenticating /
//!   logged in)
//! - [`token_store`] -- credential storage (OS keyring or in-memory)

pub mod flow;
pub mod session;
pub mod token_store;

pub use flow::{AuthorizationFlow, BrowserAuthFlow};
pub use session::{AuthState, SessionManager};
pub use token_store::{CredentialStore, KeyringStore, MemoryStore};
