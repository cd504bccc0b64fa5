//! Conversation engine
//!
//! # Module Layout
//!
//! - [`engine`]      -- [`ChatEngine`]: send/cancel lifecycle and state
//! - [`state`]       -- [`ChatState`]: the observable conversation snapshot
//! - [`reveal`]      -- character-by-character reply reveal
//! - [`suggestions`] -- starter and follow-up suggestion chips

pub mod engine;
pub mod reveal;
pub mod state;
pub mod suggestions;

pub use engine::{ChatEngine, EngineOptions, FAILED_REPLY_TEXT};
pub use state::ChatState;
