//! HTTP client for the SDU Chat API
//!
//! [`ApiClient`] builds JSON requests relative to the configured base URL,
//! attaches a bearer token when one is available, and classifies failures:
//!
//! - 2xx: the body is decoded into the expected type, or
//!   [`SduChatError::Decode`] if it does not match.
//! - any other status: the body is decoded as an [`ErrorResponse`] and
//!   returned as [`SduChatError::Server`]; if that fails the raw status is
//!   returned as [`SduChatError::Transport`].
//!
//! The public `chats/send-message` endpoint additionally tolerates servers
//! that answer with a loose `{content | answer | message, sources}` object
//! instead of a [`SendResult`].
//!
//! The access token lives in a [`CredentialStore`]; the client is the only
//! component that reads or writes it.

pub mod fake;
pub mod netlog;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::auth::token_store::{CredentialStore, ACCESS_TOKEN_KEY};
use crate::config::ApiConfig;
use crate::error::{Result, SduChatError};
use crate::ids;

pub use types::{Chat, ErrorResponse, LoginResponse, Message, Page, SendResult};
use types::{ChatCreateRequest, CodeRequest, LenientReply, MessageCreateRequest};

/// Text used when a lenient public reply carries no content at all.
pub const EMPTY_REPLY_PLACEHOLDER: &str = "(пусто)";

/// Chat title reported for replies synthesized from the lenient shape.
pub const LENIENT_CHAT_TITLE: &str = "Web";

/// Default page size for chat listings.
pub const DEFAULT_CHATS_PAGE_SIZE: u32 = 20;

/// Default page size for message listings.
pub const DEFAULT_MESSAGES_PAGE_SIZE: u32 = 30;

/// Message-sending operations the conversation engine depends on.
///
/// [`ApiClient`] is the production implementation; tests substitute
/// in-process fakes.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Sends `content` to an existing chat (authenticated).
    async fn send_message(&self, chat_id: i64, content: &str) -> Result<SendResult>;

    /// Sends `content` through the public endpoint (no user token).
    async fn send_message_public(&self, content: &str) -> Result<SendResult>;

    /// Creates a chat whose first message is `content` (authenticated).
    async fn create_chat_and_send(&self, content: &str) -> Result<SendResult>;
}

/// Client for the SDU Chat REST API.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use sduchat::api::ApiClient;
/// use sduchat::auth::token_store::MemoryStore;
/// use sduchat::config::ApiConfig;
///
/// # async fn example() -> sduchat::error::Result<()> {
/// let config = ApiConfig {
///     base_url: "https://api.sdu.example/".to_string(),
///     ..ApiConfig::default()
/// };
/// let client = ApiClient::new(&config, Arc::new(MemoryStore::default()))?;
/// let reply = client.send_message_public("Где расписание?").await?;
/// println!("{}", reply.message.content);
/// # Ok(())
/// # }
/// ```
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    /// Full `Authorization` value for the public endpoint
    static_authorization: Option<String>,
    store: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field(
                "static_authorization",
                &self.static_authorization.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

impl ApiClient {
    /// Creates a client for `config.base_url` that keeps its token in
    /// `store`.
    ///
    /// # Errors
    ///
    /// Returns [`SduChatError::Url`] if the base URL does not parse and
    /// [`SduChatError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        let mut base_url = Url::parse(config.base_url.trim()).map_err(SduChatError::Url)?;
        // Without a trailing slash `join` would replace the last path segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(SduChatError::Http)?;

        let static_authorization = config
            .static_bearer
            .as_deref()
            .and_then(static_authorization_value);

        Ok(Self {
            http,
            base_url,
            static_authorization,
            store,
        })
    }

    /// Base URL every endpoint path is resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the stored access token, if any.
    ///
    /// A credential store failure is logged and treated as "no token".
    pub fn token(&self) -> Option<String> {
        match self.store.get(ACCESS_TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!("Failed to read access token: {}", e);
                None
            }
        }
    }

    /// Stores `token`, or deletes the stored token when `None`.
    pub fn set_token(&self, token: Option<&str>) -> Result<()> {
        match token {
            Some(t) => self.store.set(ACCESS_TOKEN_KEY, t),
            None => self.store.delete(ACCESS_TOKEN_KEY),
        }
    }

    // -----------------------------------------------------------------------
    // Auth
    // -----------------------------------------------------------------------

    /// Exchanges a Google authorization code for an access token and stores
    /// the token.
    pub async fn auth_google(&self, code: &str) -> Result<LoginResponse> {
        let body = json_body(&CodeRequest { code })?;
        let login: LoginResponse = self
            .call(Method::POST, self.endpoint("auth/google")?, None, Some(body))
            .await?;
        self.set_token(Some(&login.access_token))?;
        Ok(login)
    }

    // -----------------------------------------------------------------------
    // Chats
    // -----------------------------------------------------------------------

    /// Lists the user's chats.
    pub async fn list_chats(&self, page: u32, size: u32) -> Result<Page<Chat>> {
        let url = self.paged_endpoint("chats", page, size)?;
        self.call(Method::GET, url, self.user_authorization(), None).await
    }

    /// Creates an empty chat.
    pub async fn create_chat(&self, title: &str) -> Result<Chat> {
        let body = json_body(&ChatCreateRequest { title })?;
        self.call(Method::POST, self.endpoint("chats")?, self.user_authorization(), Some(body))
            .await
    }

    /// Fetches a single chat.
    pub async fn get_chat(&self, chat_id: i64) -> Result<Chat> {
        let url = self.endpoint(&format!("chats/{}", chat_id))?;
        self.call(Method::GET, url, self.user_authorization(), None).await
    }

    /// Deletes a chat. The response body is ignored.
    pub async fn delete_chat(&self, chat_id: i64) -> Result<()> {
        let url = self.endpoint(&format!("chats/{}", chat_id))?;
        let result = self
            .exchange(Method::DELETE, url.clone(), self.user_authorization(), None)
            .await
            .map(|_| ());
        if let Err(e) = &result {
            netlog::error(&url, e);
        }
        result
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// Lists the messages of a chat.
    pub async fn list_messages(&self, chat_id: i64, page: u32, size: u32) -> Result<Page<Message>> {
        let url = self.paged_endpoint(&format!("chats/{}/messages", chat_id), page, size)?;
        self.call(Method::GET, url, self.user_authorization(), None).await
    }

    /// Sends `content` to an existing chat.
    pub async fn send_message(&self, chat_id: i64, content: &str) -> Result<SendResult> {
        let url = self.endpoint(&format!("chats/{}/messages", chat_id))?;
        let body = json_body(&MessageCreateRequest { content })?;
        self.call(Method::POST, url, self.user_authorization(), Some(body)).await
    }

    /// Creates a chat with `content` as its first message.
    pub async fn create_chat_and_send(&self, content: &str) -> Result<SendResult> {
        let body = json_body(&MessageCreateRequest { content })?;
        self.call(
            Method::POST,
            self.endpoint("messages/first")?,
            self.user_authorization(),
            Some(body),
        )
        .await
    }

    /// Sends `content` through the public endpoint.
    ///
    /// Only the optional static credential is attached, never the user's
    /// token.
    /// A 2xx body that is not a [`SendResult`] is accepted in the lenient
    /// shape and turned into a reply with chat id `0` and title `"Web"`.
    pub async fn send_message_public(&self, content: &str) -> Result<SendResult> {
        let url = self.endpoint("chats/send-message")?;
        let body = json_body(&MessageCreateRequest { content })?;

        let result = match self
            .exchange(
                Method::POST,
                url.clone(),
                self.static_authorization.clone(),
                Some(body),
            )
            .await
        {
            Ok(bytes) => decode_public_reply(&bytes),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            netlog::error(&url, e);
        }
        result
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    /// `Bearer <token>` for the signed-in user, if any.
    fn user_authorization(&self) -> Option<String> {
        self.token().map(|token| format!("Bearer {}", token))
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| SduChatError::Url(e).into())
    }

    fn paged_endpoint(&self, path: &str, page: u32, size: u32) -> Result<Url> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("size", &size.to_string());
        Ok(url)
    }

    /// Performs an exchange and decodes a 2xx body as `T`.
    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        authorization: Option<String>,
        body: Option<Vec<u8>>,
    ) -> Result<T> {
        let result = match self.exchange(method, url.clone(), authorization, body).await {
            Ok(bytes) => decode(&bytes),
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            netlog::error(&url, e);
        }
        result
    }

    /// Sends one request and returns the body of a 2xx response.
    ///
    /// Non-2xx statuses are classified into [`SduChatError::Server`] or
    /// [`SduChatError::Transport`].
    async fn exchange(
        &self,
        method: Method,
        url: Url,
        authorization: Option<String>,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let mut builder = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let request = builder.build().map_err(SduChatError::Http)?;
        netlog::request(
            request.method(),
            request.url(),
            request.headers(),
            request.body().and_then(|b| b.as_bytes()),
        );

        let response = self
            .http
            .execute(request)
            .await
            .map_err(SduChatError::Http)?;
        let status = response.status();
        let url = response.url().clone();
        let bytes = response.bytes().await.map_err(SduChatError::Http)?;
        netlog::response(status, &url, &bytes);

        check_status(status, &bytes)?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ChatApi for ApiClient {
    async fn send_message(&self, chat_id: i64, content: &str) -> Result<SendResult> {
        ApiClient::send_message(self, chat_id, content).await
    }

    async fn send_message_public(&self, content: &str) -> Result<SendResult> {
        ApiClient::send_message_public(self, content).await
    }

    async fn create_chat_and_send(&self, content: &str) -> Result<SendResult> {
        ApiClient::create_chat_and_send(self, content).await
    }
}

// ---------------------------------------------------------------------------
// Decoding helpers
// ---------------------------------------------------------------------------

fn json_body<B: Serialize + ?Sized>(body: &B) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(body)?)
}

/// Maps a non-2xx status to a server or transport error.
fn check_status(status: StatusCode, body: &[u8]) -> Result<()> {
    if status.is_success() {
        return Ok(());
    }
    match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(e) => Err(SduChatError::Server {
            error: e.error,
            message: e.message,
            timestamp: e.timestamp,
        }
        .into()),
        Err(_) => Err(SduChatError::Transport {
            status: status.as_u16(),
        }
        .into()),
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| SduChatError::Decode(e.to_string()).into())
}

/// Turns the configured static credential into an `Authorization` value.
///
/// A bare token gets the `Bearer` scheme. A value that already names a
/// scheme (`Bearer x`, `Basic x`, `Api-Key x`) is sent as is.
fn static_authorization_value(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        None
    } else if raw.contains(char::is_whitespace) {
        Some(raw.to_string())
    } else {
        Some(format!("Bearer {}", raw))
    }
}

/// Decodes a public-endpoint body: canonical shape first, lenient second.
pub(crate) fn decode_public_reply(body: &[u8]) -> Result<SendResult> {
    let canonical_err = match serde_json::from_slice::<SendResult>(body) {
        Ok(result) => return Ok(result),
        Err(e) => e,
    };

    let lenient: LenientReply = serde_json::from_slice(body).map_err(|e| {
        SduChatError::Decode(format!(
            "public reply matched no known shape: {}; lenient: {}",
            canonical_err, e
        ))
    })?;
    tracing::debug!("Public reply used the lenient shape: {}", canonical_err);

    let text = lenient
        .content
        .or(lenient.answer)
        .or(lenient.message)
        .unwrap_or_else(|| EMPTY_REPLY_PLACEHOLDER.to_string());
    let created_date = ids::now_iso8601();

    Ok(SendResult {
        chat_id: 0,
        title: LENIENT_CHAT_TITLE.to_string(),
        message: Message {
            id: ids::local_message_id(),
            content: text,
            sources: lenient.sources.unwrap_or_default(),
            is_user: false,
            number: 0,
            version: 1,
            created_date: created_date.clone(),
        },
        created_date: Some(created_date),
    })
}
