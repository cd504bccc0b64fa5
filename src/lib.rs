//! SDU Chat - client library for the SDU university assistant
//!
//! This library provides the client side of the SDU chat service: the HTTP
//! transport, Google sign-in and token storage, and the conversation engine
//! that drives sending, cancellation and progressive reply reveal.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `api`: HTTP client, wire types and request/response logging
//! - `auth`: credential storage, browser sign-in and login state
//! - `chat`: conversation engine, observable state and suggestions
//! - `commands`: CLI command handlers
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use sduchat::api::ApiClient;
//! use sduchat::auth::MemoryStore;
//! use sduchat::chat::{ChatEngine, EngineOptions};
//! use sduchat::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = Config::default();
//!     config.api.base_url = "https://chat.sdu.example/api/".to_string();
//!
//!     let api = Arc::new(ApiClient::new(&config.api, Arc::new(MemoryStore::default()))?);
//!     let engine = ChatEngine::new(api, EngineOptions::from(&config.chat));
//!     engine.set_input("Где посмотреть расписание?");
//!     engine.send().await;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod chat;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod ids;

// Re-export commonly used types
pub use api::{ApiClient, ChatApi};
pub use chat::{ChatEngine, ChatState, EngineOptions};
pub use config::Config;
pub use error::{Result, SduChatError};
