//! Observable conversation state

use crate::api::Message;
use crate::ids;

/// Snapshot of a conversation as presented to the user.
///
/// Published through a `watch` channel by [`ChatEngine`](super::ChatEngine);
/// every mutation produces a new observable value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatState {
    /// Messages in display order
    pub messages: Vec<Message>,
    /// Draft text
    pub input: String,
    /// `true` while a send is in flight
    pub is_thinking: bool,
    /// Server-side chat this conversation is bound to
    pub current_chat_id: Option<i64>,
}

impl ChatState {
    /// Sequence number for the next appended message.
    pub fn next_number(&self) -> i32 {
        self.messages.last().map_or(0, |m| m.number) + 1
    }

    /// Binds the conversation to `chat_id` unless already bound.
    ///
    /// A zero id means "no server chat" and is never adopted. Returns `true`
    /// if the binding changed.
    pub fn adopt_chat(&mut self, chat_id: i64) -> bool {
        if chat_id == 0 || self.current_chat_id.is_some() {
            return false;
        }
        self.current_chat_id = Some(chat_id);
        true
    }

    /// Appends a locally-authored user message.
    pub(crate) fn push_user_message(&mut self, content: String) {
        let number = self.next_number();
        self.messages.push(local_message(content, true, number));
    }

    /// Appends a locally-authored assistant message and returns its index.
    pub(crate) fn push_assistant_message(&mut self, content: String) -> usize {
        let number = self.next_number();
        self.messages.push(local_message(content, false, number));
        self.messages.len() - 1
    }
}

fn local_message(content: String, is_user: bool, number: i32) -> Message {
    Message {
        id: ids::local_message_id(),
        content,
        sources: Vec::new(),
        is_user,
        number,
        version: 1,
        created_date: ids::now_iso8601(),
    }
}
