//! Conversation engine
//!
//! [`ChatEngine`] owns one conversation: the message list, the draft input,
//! the "thinking" flag and the server chat the conversation is bound to.
//! State is published through a `tokio::sync::watch` channel; observers
//! render whatever the latest [`ChatState`] says.
//!
//! # Send lifecycle
//!
//! ```text
//! start_send / send
//!   -> user message appended, input cleared, thinking = true
//!   -> ChatApi call (public fallback or bound chat)
//!   -> [cancelled?] stop quietly
//!   -> placeholder assistant message appended
//!   -> characters revealed one by one until done or cancelled
//!   -> on error: synthetic assistant message
//!   -> thinking = false, pending cleared (if still owned)
//! ```
//!
//! At most one send is pending at a time. Calls made while a send is
//! pending are dropped, not queued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{ChatApi, Message, SendResult};
use crate::chat::reveal::reveal;
use crate::chat::state::ChatState;
use crate::chat::suggestions;
use crate::config::{ChatConfig, FirstMessageRoute};
use crate::error::{Result, SduChatError};
use crate::ids;

/// Assistant message shown when a reply could not be obtained.
pub const FAILED_REPLY_TEXT: &str = "Не удалось получить ответ. Проверь сеть и эндпоинт.";

/// Tunables for a [`ChatEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Pause before each revealed character
    pub reveal_delay: Duration,
    /// Endpoint used while the conversation has no server chat
    pub first_message_route: FirstMessageRoute,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            reveal_delay: Duration::from_millis(12),
            first_message_route: FirstMessageRoute::Public,
        }
    }
}

impl From<&ChatConfig> for EngineOptions {
    fn from(config: &ChatConfig) -> Self {
        Self {
            reveal_delay: Duration::from_millis(config.reveal_delay_ms),
            first_message_route: config.first_message_route,
        }
    }
}

/// The send currently holding the single-flight guard.
#[derive(Debug)]
struct PendingSend {
    generation: u64,
    cancel: CancellationToken,
}

/// Everything `run` needs once the user message has been recorded.
#[derive(Debug)]
struct Ticket {
    generation: u64,
    cancel: CancellationToken,
    text: String,
}

struct EngineInner {
    api: Arc<dyn ChatApi>,
    options: EngineOptions,
    state: watch::Sender<ChatState>,
    // Lock order: `pending` before `state`.
    pending: Mutex<Option<PendingSend>>,
    generations: AtomicU64,
}

/// Single-conversation chat session.
///
/// Cloning is cheap; clones share the same conversation.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use sduchat::api::fake::FakeChatApi;
/// use sduchat::chat::{ChatEngine, EngineOptions};
///
/// # #[tokio::main]
/// # async fn main() {
/// let api = Arc::new(FakeChatApi::new());
/// api.push_reply(FakeChatApi::reply(42, "Салем!"));
///
/// let options = EngineOptions {
///     reveal_delay: Duration::ZERO,
///     ..EngineOptions::default()
/// };
/// let engine = ChatEngine::new(api, options);
/// engine.set_input("Привет");
/// engine.send().await;
///
/// let state = engine.snapshot();
/// assert_eq!(state.messages.len(), 2);
/// assert_eq!(state.messages[1].content, "Салем!");
/// assert_eq!(state.current_chat_id, Some(42));
/// # }
/// ```
#[derive(Clone)]
pub struct ChatEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for ChatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("ChatEngine")
            .field("options", &self.inner.options)
            .field("messages", &state.messages.len())
            .field("is_thinking", &state.is_thinking)
            .field("current_chat_id", &state.current_chat_id)
            .finish()
    }
}

impl ChatEngine {
    /// Creates an engine for a new, unbound conversation.
    pub fn new(api: Arc<dyn ChatApi>, options: EngineOptions) -> Self {
        Self::with_state(api, options, ChatState::default())
    }

    /// Creates an engine bound to an existing server chat.
    ///
    /// `history` is ordered by sequence number. A zero `chat_id` leaves the
    /// conversation unbound.
    pub fn resume(
        api: Arc<dyn ChatApi>,
        options: EngineOptions,
        chat_id: i64,
        mut history: Vec<Message>,
    ) -> Self {
        history.sort_by_key(|m| m.number);
        let mut state = ChatState {
            messages: history,
            ..ChatState::default()
        };
        state.adopt_chat(chat_id);
        Self::with_state(api, options, state)
    }

    fn with_state(api: Arc<dyn ChatApi>, options: EngineOptions, state: ChatState) -> Self {
        let (state, _) = watch::channel(state);
        Self {
            inner: Arc::new(EngineInner {
                api,
                options,
                state,
                pending: Mutex::new(None),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ChatState> {
        self.inner.state.subscribe()
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> ChatState {
        self.inner.state.borrow().clone()
    }

    /// Server chat the conversation is bound to.
    pub fn current_chat_id(&self) -> Option<i64> {
        self.inner.state.borrow().current_chat_id
    }

    /// `true` while a send holds the single-flight guard.
    pub fn is_pending(&self) -> bool {
        self.inner.lock_pending().is_some()
    }

    /// Replaces the draft input.
    pub fn set_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.inner.state.send_modify(|s| s.input = text);
    }

    /// Starts sending the draft input in the background.
    ///
    /// Returns `None` without side effects when the trimmed input is empty
    /// or another send is pending. The user message is appended before this
    /// returns.
    pub fn start_send(&self) -> Option<JoinHandle<()>> {
        let ticket = self.inner.prepare()?;
        let inner = Arc::clone(&self.inner);
        Some(tokio::spawn(async move { inner.run(ticket).await }))
    }

    /// Sends the draft input and waits for the reply to be revealed.
    ///
    /// Failures become a synthetic assistant message; nothing is returned.
    pub async fn send(&self) {
        if let Some(ticket) = self.inner.prepare() {
            self.inner.run(ticket).await;
        }
    }

    /// Stops the pending send at its next checkpoint.
    ///
    /// Text already revealed stays. The thinking flag clears immediately.
    pub fn cancel_current_response(&self) {
        let mut pending = self.inner.lock_pending();
        let taken = pending.take();
        self.inner.state.send_modify(|s| {
            if let Some(send) = &taken {
                send.cancel.cancel();
            }
            s.is_thinking = false;
        });
        if let Some(send) = taken {
            tracing::debug!(generation = send.generation, "Cancelled pending send");
        }
    }

    /// Follow-up suggestions for the latest assistant reply.
    pub fn follow_up_suggestions(&self) -> Vec<String> {
        let state = self.inner.state.borrow();
        suggestions::follow_ups(&state.messages)
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Puts `text` into the draft input without sending it.
    pub fn apply_suggestion(&self, text: &str) {
        self.set_input(text);
    }

    /// Suggestions offered on an empty conversation.
    pub fn starter_suggestions() -> &'static [&'static str] {
        suggestions::STARTER_SUGGESTIONS
    }
}

impl EngineInner {
    fn lock_pending(&self) -> MutexGuard<'_, Option<PendingSend>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claims the single-flight guard and records the user message.
    fn prepare(&self) -> Option<Ticket> {
        let mut pending = self.lock_pending();
        if pending.is_some() {
            tracing::debug!("Send already pending; ignoring");
            return None;
        }

        let mut text = String::new();
        self.state.send_if_modified(|s| {
            let trimmed = s.input.trim();
            if trimmed.is_empty() {
                return false;
            }
            text = trimmed.to_string();
            s.push_user_message(text.clone());
            s.input.clear();
            s.is_thinking = true;
            true
        });
        if text.is_empty() {
            return None;
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        *pending = Some(PendingSend {
            generation,
            cancel: cancel.clone(),
        });
        Some(Ticket {
            generation,
            cancel,
            text,
        })
    }

    async fn run(&self, ticket: Ticket) {
        let Ticket {
            generation,
            cancel,
            text,
        } = ticket;

        match self.exchange(&text, &cancel).await {
            Ok(()) => {}
            Err(e) if cancel.is_cancelled() || SduChatError::is_cancelled(&e) => {
                tracing::debug!(generation, "Send cancelled");
            }
            Err(e) => {
                tracing::warn!("Send failed: {:#}", e);
                self.state.send_if_modified(|s| {
                    if cancel.is_cancelled() {
                        return false;
                    }
                    s.push_assistant_message(FAILED_REPLY_TEXT.to_string());
                    true
                });
            }
        }

        self.finish(generation);
    }

    async fn exchange(&self, text: &str, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(SduChatError::Cancelled.into());
        }

        let bound_chat = self.state.borrow().current_chat_id;
        let result = match bound_chat {
            Some(chat_id) => self.api.send_message(chat_id, text).await?,
            None => {
                let result = match self.options.first_message_route {
                    FirstMessageRoute::Public => self.api.send_message_public(text).await?,
                    FirstMessageRoute::Authenticated => {
                        self.api.create_chat_and_send(text).await?
                    }
                };
                if self.state.send_if_modified(|s| s.adopt_chat(result.chat_id)) {
                    tracing::info!(chat_id = result.chat_id, "Conversation bound to server chat");
                }
                result
            }
        };

        if cancel.is_cancelled() {
            return Err(SduChatError::Cancelled.into());
        }

        self.reveal_reply(result, cancel).await;
        Ok(())
    }

    async fn reveal_reply(&self, result: SendResult, cancel: &CancellationToken) {
        let SendResult { message, .. } = result;
        let id = if message.id == 0 {
            ids::local_message_id()
        } else {
            message.id
        };
        let placeholder = Message {
            id,
            content: String::new(),
            sources: message.sources,
            is_user: message.is_user,
            number: 0,
            version: message.version,
            created_date: message.created_date,
        };

        let mut index = None;
        self.state.send_if_modified(|s| {
            if cancel.is_cancelled() {
                return false;
            }
            let mut placeholder = placeholder.clone();
            placeholder.number = s.next_number();
            s.messages.push(placeholder);
            index = Some(s.messages.len() - 1);
            true
        });
        let Some(index) = index else {
            return;
        };

        let completed = reveal(&message.content, self.options.reveal_delay, cancel, |ch| {
            self.state.send_if_modified(|s| {
                if cancel.is_cancelled() {
                    return false;
                }
                match s.messages.get_mut(index) {
                    Some(m) if m.id == id => {
                        m.content.push(ch);
                        true
                    }
                    _ => false,
                }
            });
        })
        .await;
        tracing::debug!(message_id = id, completed, "Reply revealed");
    }

    /// Releases the guard if `generation` still owns it.
    fn finish(&self, generation: u64) {
        let mut pending = self.lock_pending();
        if pending.as_ref().map(|p| p.generation) == Some(generation) {
            *pending = None;
            self.state.send_modify(|s| s.is_thinking = false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fake::{FakeCall, FakeChatApi};

    fn fast() -> EngineOptions {
        EngineOptions {
            reveal_delay: Duration::ZERO,
            ..EngineOptions::default()
        }
    }

    fn engine_with(api: &Arc<FakeChatApi>, options: EngineOptions) -> ChatEngine {
        ChatEngine::new(api.clone(), options)
    }

    fn history_message(number: i32, is_user: bool) -> Message {
        Message {
            id: 100 + number as i64,
            content: format!("m{}", number),
            sources: Vec::new(),
            is_user,
            number,
            version: 1,
            created_date: "2024-05-01T10:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_blank_input_is_a_no_op() {
        let api = Arc::new(FakeChatApi::new());
        let engine = engine_with(&api, fast());
        engine.set_input("   \n");

        assert!(engine.start_send().is_none());
        engine.send().await;

        let state = engine.snapshot();
        assert!(state.messages.is_empty());
        assert!(!state.is_thinking);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_user_message_appended_before_network_call() {
        let (api, gate) = FakeChatApi::gated();
        let api = Arc::new(api);
        api.push_reply(FakeChatApi::reply(42, "ok"));
        let engine = engine_with(&api, fast());

        engine.set_input("  Привет  ");
        let handle = engine.start_send().unwrap();

        let state = engine.snapshot();
        assert_eq!(state.messages.len(), 1);
        assert!(state.messages[0].is_user);
        assert_eq!(state.messages[0].content, "Привет");
        assert_eq!(state.messages[0].number, 1);
        assert!(state.input.is_empty());
        assert!(state.is_thinking);

        gate.add_permits(1);
        handle.await.unwrap();
        assert!(!engine.snapshot().is_thinking);
    }

    #[tokio::test]
    async fn test_double_start_send_makes_one_call() {
        let (api, gate) = FakeChatApi::gated();
        let api = Arc::new(api);
        api.push_reply(FakeChatApi::reply(42, "ok"));
        let engine = engine_with(&api, fast());

        engine.set_input("first");
        let handle = engine.start_send().unwrap();
        engine.set_input("second");
        assert!(engine.start_send().is_none());
        assert!(engine.is_pending());

        gate.add_permits(1);
        handle.await.unwrap();

        assert_eq!(api.calls().len(), 1);
        let state = engine.snapshot();
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.input, "second");
        assert!(!engine.is_pending());
    }

    #[tokio::test]
    async fn test_first_send_adopts_chat_then_uses_bound_chat() {
        let api = Arc::new(FakeChatApi::new());
        api.push_reply(FakeChatApi::reply(42, "Привет!"));
        api.push_reply(FakeChatApi::reply(99, "Ещё"));
        let engine = engine_with(&api, fast());

        engine.set_input("one");
        engine.send().await;
        assert_eq!(engine.current_chat_id(), Some(42));

        engine.set_input("two");
        engine.send().await;

        assert_eq!(
            api.calls(),
            vec![
                FakeCall::Public {
                    content: "one".to_string()
                },
                FakeCall::Chat {
                    chat_id: 42,
                    content: "two".to_string()
                },
            ]
        );
        // Set once: the second reply's chat id is ignored.
        assert_eq!(engine.current_chat_id(), Some(42));

        let numbers: Vec<i32> = engine.snapshot().messages.iter().map(|m| m.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_zero_chat_id_is_not_adopted() {
        let api = Arc::new(FakeChatApi::new());
        api.push_reply(FakeChatApi::reply(0, "a"));
        api.push_reply(FakeChatApi::reply(0, "b"));
        let engine = engine_with(&api, fast());

        engine.set_input("one");
        engine.send().await;
        engine.set_input("two");
        engine.send().await;

        assert_eq!(engine.current_chat_id(), None);
        assert!(api
            .calls()
            .iter()
            .all(|c| matches!(c, FakeCall::Public { .. })));
    }

    #[tokio::test]
    async fn test_authenticated_first_message_route() {
        let api = Arc::new(FakeChatApi::new());
        api.push_reply(FakeChatApi::reply(5, "ok"));
        let options = EngineOptions {
            first_message_route: FirstMessageRoute::Authenticated,
            ..fast()
        };
        let engine = engine_with(&api, options);

        engine.set_input("hi");
        engine.send().await;

        assert_eq!(
            api.calls(),
            vec![FakeCall::CreateAndSend {
                content: "hi".to_string()
            }]
        );
        assert_eq!(engine.current_chat_id(), Some(5));
    }

    #[tokio::test]
    async fn test_reveal_without_cancel_is_exact() {
        let api = Arc::new(FakeChatApi::new());
        let mut reply = FakeChatApi::reply(42, "Расписание доступно в PMS.");
        reply.message.sources = vec!["https://sdu.edu.kz/schedule".to_string()];
        api.push_reply(reply);
        let options = EngineOptions {
            reveal_delay: Duration::from_millis(1),
            ..EngineOptions::default()
        };
        let engine = engine_with(&api, options);

        engine.set_input("где расписание?");
        engine.send().await;

        let state = engine.snapshot();
        let bot = &state.messages[1];
        assert!(!bot.is_user);
        assert_eq!(bot.id, 1042);
        assert_eq!(bot.number, 2);
        assert_eq!(bot.content, "Расписание доступно в PMS.");
        assert_eq!(bot.sources, vec!["https://sdu.edu.kz/schedule".to_string()]);
        assert!(!state.is_thinking);
    }

    #[tokio::test]
    async fn test_zero_message_id_gets_generated_id() {
        let api = Arc::new(FakeChatApi::new());
        let mut reply = FakeChatApi::reply(42, "ok");
        reply.message.id = 0;
        api.push_reply(reply);
        let engine = engine_with(&api, fast());

        engine.set_input("hi");
        engine.send().await;

        let state = engine.snapshot();
        assert_ne!(state.messages[1].id, 0);
        assert_ne!(state.messages[1].id, state.messages[0].id);
    }

    #[tokio::test]
    async fn test_cancel_mid_reveal_keeps_strict_prefix() {
        let api = Arc::new(FakeChatApi::new());
        let text = "Стипендии выплачиваются ежемесячно до 25 числа.";
        api.push_reply(FakeChatApi::reply(42, text));
        let options = EngineOptions {
            reveal_delay: Duration::from_millis(5),
            ..EngineOptions::default()
        };
        let engine = engine_with(&api, options);
        let mut rx = engine.subscribe();

        engine.set_input("стипендия?");
        let handle = engine.start_send().unwrap();

        // Wait for a few characters to appear.
        loop {
            rx.changed().await.unwrap();
            let revealed = rx
                .borrow_and_update()
                .messages
                .get(1)
                .map_or(0, |m| m.content.chars().count());
            if revealed >= 3 {
                break;
            }
        }

        engine.cancel_current_response();
        assert!(!engine.snapshot().is_thinking);
        assert!(!engine.is_pending());
        handle.await.unwrap();

        let state = engine.snapshot();
        let content = &state.messages[1].content;
        assert!(!content.is_empty());
        assert!(text.starts_with(content.as_str()));
        assert!(content.len() < text.len());
        assert!(!state.is_thinking);
        assert_eq!(state.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_server_error_appends_failure_message() {
        let api = Arc::new(FakeChatApi::new());
        api.push_error(SduChatError::Server {
            error: "INTERNAL".to_string(),
            message: "boom".to_string(),
            timestamp: 0,
        });
        let engine = engine_with(&api, fast());

        engine.set_input("hi");
        engine.send().await;

        let state = engine.snapshot();
        assert_eq!(state.messages.len(), 2);
        let failure = &state.messages[1];
        assert!(!failure.is_user);
        assert_eq!(failure.content, FAILED_REPLY_TEXT);
        assert_eq!(failure.number, 2);
        assert!(failure.sources.is_empty());
        assert!(!state.is_thinking);
        assert_eq!(state.current_chat_id, None);
    }

    #[tokio::test]
    async fn test_cancel_during_request_suppresses_failure_message() {
        let (api, gate) = FakeChatApi::gated();
        let api = Arc::new(api);
        api.push_error(SduChatError::Transport { status: 502 });
        let engine = engine_with(&api, fast());

        engine.set_input("hi");
        let handle = engine.start_send().unwrap();
        engine.cancel_current_response();
        gate.add_permits(1);
        handle.await.unwrap();

        let state = engine.snapshot();
        assert_eq!(state.messages.len(), 1);
        assert!(!state.is_thinking);
    }

    #[tokio::test]
    async fn test_cancel_during_request_skips_reply_but_binds_chat() {
        let (api, gate) = FakeChatApi::gated();
        let api = Arc::new(api);
        api.push_reply(FakeChatApi::reply(42, "late"));
        let engine = engine_with(&api, fast());

        engine.set_input("hi");
        let handle = engine.start_send().unwrap();
        // Let the task reach the gated call before cancelling.
        while api.calls().is_empty() {
            tokio::task::yield_now().await;
        }
        engine.cancel_current_response();
        gate.add_permits(1);
        handle.await.unwrap();

        let state = engine.snapshot();
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.current_chat_id, Some(42));
    }

    #[tokio::test]
    async fn test_stale_send_does_not_clear_newer_thinking() {
        let (api, gate) = FakeChatApi::gated();
        let api = Arc::new(api);
        api.push_reply(FakeChatApi::reply(42, "first"));
        api.push_reply(FakeChatApi::reply(42, "second"));
        let engine = engine_with(&api, fast());

        engine.set_input("one");
        let first = engine.start_send().unwrap();
        while api.calls().is_empty() {
            tokio::task::yield_now().await;
        }
        engine.cancel_current_response();

        engine.set_input("two");
        let second = engine.start_send().unwrap();

        gate.add_permits(1);
        first.await.unwrap();
        // The cancelled send must leave the newer one's state alone.
        assert!(engine.snapshot().is_thinking);
        assert!(engine.is_pending());

        gate.add_permits(1);
        second.await.unwrap();
        assert!(!engine.snapshot().is_thinking);
        assert!(!engine.is_pending());
    }

    #[tokio::test]
    async fn test_follow_up_suggestions_track_last_reply() {
        let api = Arc::new(FakeChatApi::new());
        api.push_reply(FakeChatApi::reply(
            42,
            "Гранты и стипендии публикуются в расписании выплат.",
        ));
        let engine = engine_with(&api, fast());
        assert!(engine.follow_up_suggestions().is_empty());

        engine.set_input("вопрос");
        engine.send().await;

        let suggestions = engine.follow_up_suggestions();
        assert_eq!(suggestions[0], "Как смотреть изменения в расписании?");
        assert_eq!(suggestions.len(), 3);
    }

    #[tokio::test]
    async fn test_apply_suggestion_sets_input_without_sending() {
        let api = Arc::new(FakeChatApi::new());
        let engine = engine_with(&api, fast());

        engine.apply_suggestion(ChatEngine::starter_suggestions()[0]);

        let state = engine.snapshot();
        assert_eq!(state.input, "Где посмотреть расписание?");
        assert!(state.messages.is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_resume_binds_chat_and_orders_history() {
        let api = Arc::new(FakeChatApi::new());
        api.push_reply(FakeChatApi::reply(7, "ok"));
        let history = vec![history_message(2, false), history_message(1, true)];
        let engine = ChatEngine::resume(api.clone(), fast(), 7, history);

        let numbers: Vec<i32> = engine.snapshot().messages.iter().map(|m| m.number).collect();
        assert_eq!(numbers, vec![1, 2]);

        engine.set_input("next");
        engine.send().await;

        assert_eq!(
            api.calls(),
            vec![FakeCall::Chat {
                chat_id: 7,
                content: "next".to_string()
            }]
        );
        assert_eq!(engine.snapshot().messages[2].number, 3);
    }

    #[test]
    fn test_engine_options_from_config() {
        let config = ChatConfig {
            reveal_delay_ms: 0,
            first_message_route: FirstMessageRoute::Authenticated,
            ..ChatConfig::default()
        };
        let options = EngineOptions::from(&config);
        assert_eq!(options.reveal_delay, Duration::ZERO);
        assert_eq!(options.first_message_route, FirstMessageRoute::Authenticated);
    }
}
