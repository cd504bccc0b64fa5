//! In-process fake [`ChatApi`] for engine unit and integration tests
//!
//! [`FakeChatApi`] records every call and answers from a queue of scripted
//! replies. A gated fake holds each call until the test releases it, which
//! makes "request in flight" states observable without a network.
//!
//! # Example
//!
//! ```
//! use sduchat::api::fake::{FakeCall, FakeChatApi};
//! use sduchat::api::ChatApi;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let api = FakeChatApi::new();
//! api.push_reply(FakeChatApi::reply(42, "Привет"));
//!
//! let result = api.send_message_public("hi").await.unwrap();
//! assert_eq!(result.chat_id, 42);
//! assert_eq!(api.calls(), vec![FakeCall::Public { content: "hi".into() }]);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::api::{ChatApi, Message, SendResult};
use crate::error::{Result, SduChatError};

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    /// `send_message(chat_id, content)`
    Chat { chat_id: i64, content: String },
    /// `send_message_public(content)`
    Public { content: String },
    /// `create_chat_and_send(content)`
    CreateAndSend { content: String },
}

/// Scripted [`ChatApi`].
///
/// When the reply queue is empty, calls fail with HTTP 500.
#[derive(Debug, Default)]
pub struct FakeChatApi {
    calls: Mutex<Vec<FakeCall>>,
    replies: Mutex<VecDeque<Result<SendResult>>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeChatApi {
    /// Creates a fake that answers immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fake whose calls each wait for one permit on the returned
    /// semaphore.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let api = Self {
            gate: Some(gate.clone()),
            ..Self::default()
        };
        (api, gate)
    }

    /// Builds a reply in `chat_id` carrying an assistant message.
    pub fn reply(chat_id: i64, content: &str) -> SendResult {
        SendResult {
            chat_id,
            title: "Web".to_string(),
            message: Message {
                id: 1000 + chat_id,
                content: content.to_string(),
                sources: Vec::new(),
                is_user: false,
                number: 2,
                version: 1,
                created_date: "2024-05-01T10:00:00Z".to_string(),
            },
            created_date: None,
        }
    }

    /// Queues a successful reply.
    pub fn push_reply(&self, reply: SendResult) {
        lock(&self.replies).push_back(Ok(reply));
    }

    /// Queues a failure.
    pub fn push_error(&self, error: SduChatError) {
        lock(&self.replies).push_back(Err(error.into()));
    }

    /// Calls recorded so far, in order.
    pub fn calls(&self) -> Vec<FakeCall> {
        lock(&self.calls).clone()
    }

    async fn respond(&self, call: FakeCall) -> Result<SendResult> {
        lock(&self.calls).push(call);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| SduChatError::Cancelled)?
                .forget();
        }

        lock(&self.replies)
            .pop_front()
            .unwrap_or_else(|| Err(SduChatError::Transport { status: 500 }.into()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ChatApi for FakeChatApi {
    async fn send_message(&self, chat_id: i64, content: &str) -> Result<SendResult> {
        self.respond(FakeCall::Chat {
            chat_id,
            content: content.to_string(),
        })
        .await
    }

    async fn send_message_public(&self, content: &str) -> Result<SendResult> {
        self.respond(FakeCall::Public {
            content: content.to_string(),
        })
        .await
    }

    async fn create_chat_and_send(&self, content: &str) -> Result<SendResult> {
        self.respond(FakeCall::CreateAndSend {
            content: content.to_string(),
        })
        .await
    }
}
