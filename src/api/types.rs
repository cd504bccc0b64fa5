//! Wire types for the SDU Chat API
//!
//! Field names follow the server's camelCase JSON. Optional fields use
//! `#[serde(default)]` so partially populated responses still decode.

use serde::{Deserialize, Serialize};

/// Response of `POST auth/google`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Bearer token for authenticated endpoints
    pub access_token: String,
    /// Refresh token, when the server issues one
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Structured error body sent with non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: i64,
}

/// A server-side chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: i64,
    pub title: String,
    pub created_date: String,
}

/// A single chat message, either from the user or from the assistant.
///
/// `content` is mutable so that assistant replies can be revealed
/// progressively after the full text has been received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Identity, unique within a session; `0` means "not assigned"
    pub id: i64,
    pub content: String,
    /// Citations backing the answer (often URLs)
    pub sources: Vec<String>,
    #[serde(rename = "user")]
    pub is_user: bool,
    /// Sequence number within the chat
    pub number: i32,
    pub version: i32,
    /// ISO-8601 creation timestamp
    pub created_date: String,
}

/// Result of sending a message: the chat it landed in and the reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    /// Chat identity; `0` means no server-side chat was created
    pub chat_id: i64,
    pub title: String,
    #[serde(rename = "messageResponse")]
    pub message: Message,
    #[serde(default)]
    pub created_date: Option<String>,
}

/// Paginated list envelope.
///
/// Servers put the page items under either `items` or `content`; use
/// [`Page::data`] to read whichever is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Option<Vec<T>>,
    pub content: Option<Vec<T>>,
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub total: Option<u64>,
    pub total_elements: Option<u64>,
    pub total_pages: Option<u32>,
}

impl<T> Page<T> {
    /// Page items: `items` if present, otherwise `content`, otherwise empty.
    pub fn data(&self) -> &[T] {
        self.items
            .as_deref()
            .or(self.content.as_deref())
            .unwrap_or(&[])
    }

    /// Consumes the page and returns its items.
    pub fn into_data(self) -> Vec<T> {
        self.items.or(self.content).unwrap_or_default()
    }
}

/// Request body for `POST auth/google`.
#[derive(Debug, Serialize)]
pub(crate) struct CodeRequest<'a> {
    pub code: &'a str,
}

/// Request body for `POST chats`.
#[derive(Debug, Serialize)]
pub(crate) struct ChatCreateRequest<'a> {
    pub title: &'a str,
}

/// Request body for every message-sending endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct MessageCreateRequest<'a> {
    pub content: &'a str,
}

/// Permissive reply shape accepted from the public endpoint when the
/// canonical [`SendResult`] does not decode.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct LenientReply {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}
