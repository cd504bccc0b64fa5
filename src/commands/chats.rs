//! Chat management commands
//!
//! Listing, inspecting, creating and deleting the signed-in user's chats,
//! and paging through a chat's messages. Output is a table by default or
//! pretty-printed JSON with `--json`.

use crate::api::{ApiClient, Chat, Message, Page};
use crate::error::{Result, SduChatError};
use prettytable::{row, Table};

/// Widest message excerpt shown in the messages table.
const EXCERPT_CHARS: usize = 60;

/// Fails unless an access token is stored.
///
/// # Errors
///
/// Returns `SduChatError::Authentication` when no token is stored.
pub fn ensure_signed_in(api: &ApiClient) -> Result<()> {
    if api.token().is_none() {
        return Err(SduChatError::Authentication(
            "not signed in; run `sduchat login` first".to_string(),
        )
        .into());
    }
    Ok(())
}

/// List one page of chats
///
/// # Examples
///
/// ```no_run
/// use sduchat::commands::chats::list_chats;
/// # async fn example(api: &sduchat::api::ApiClient) -> anyhow::Result<()> {
/// list_chats(api, 0, 20, false).await?;
/// # Ok(())
/// # }
/// ```
pub async fn list_chats(api: &ApiClient, page: u32, size: u32, json: bool) -> Result<()> {
    ensure_signed_in(api)?;
    tracing::debug!("chats::list_chats page: {}, size: {}, json: {}", page, size, json);

    let result = api.list_chats(page, size).await?;
    if json {
        return output_json(result.data());
    }

    if result.data().is_empty() {
        println!("No chats yet.");
        return Ok(());
    }
    println!();
    chats_table(result.data()).printstd();
    println!("{}\n", page_footer(&result));
    Ok(())
}

/// Show a single chat
pub async fn show_chat(api: &ApiClient, chat_id: i64) -> Result<()> {
    ensure_signed_in(api)?;
    let chat = api.get_chat(chat_id).await?;
    println!();
    chats_table(std::slice::from_ref(&chat)).printstd();
    println!();
    Ok(())
}

/// Create an empty chat and print its identity
pub async fn create_chat(api: &ApiClient, title: &str) -> Result<()> {
    ensure_signed_in(api)?;
    let chat = api.create_chat(title).await?;
    tracing::info!("Created chat {}", chat.id);
    println!("Created chat {} ({})", chat.id, chat.title);
    Ok(())
}

/// Delete a chat
pub async fn delete_chat(api: &ApiClient, chat_id: i64) -> Result<()> {
    ensure_signed_in(api)?;
    api.delete_chat(chat_id).await?;
    tracing::info!("Deleted chat {}", chat_id);
    println!("Deleted chat {}", chat_id);
    Ok(())
}

/// List one page of a chat's messages
pub async fn list_messages(
    api: &ApiClient,
    chat_id: i64,
    page: u32,
    size: u32,
    json: bool,
) -> Result<()> {
    ensure_signed_in(api)?;
    tracing::debug!(
        "chats::list_messages chat: {}, page: {}, size: {}, json: {}",
        chat_id,
        page,
        size,
        json
    );

    let result = api.list_messages(chat_id, page, size).await?;
    if json {
        return output_json(result.data());
    }

    if result.data().is_empty() {
        println!("Chat {} has no messages.", chat_id);
        return Ok(());
    }
    println!();
    messages_table(result.data()).printstd();
    println!("{}\n", page_footer(&result));
    Ok(())
}

/// Output a serializable value as pretty JSON
///
/// # Errors
///
/// Returns `SduChatError::Serialization` if serialization fails
fn output_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(SduChatError::Serialization)?;
    println!("{}", json);
    Ok(())
}

/// Table of chats
pub(crate) fn chats_table(chats: &[Chat]) -> Table {
    let mut table = Table::new();
    table.add_row(row!["ID", "Title", "Created"]);
    for chat in chats {
        table.add_row(row![chat.id, chat.title, chat.created_date]);
    }
    table
}

/// Table of messages with content excerpts
pub(crate) fn messages_table(messages: &[Message]) -> Table {
    let mut table = Table::new();
    table.add_row(row!["#", "From", "Message", "Sources"]);
    for message in messages {
        let from = if message.is_user { "you" } else { "assistant" };
        table.add_row(row![
            message.number,
            from,
            excerpt(&message.content),
            message.sources.len()
        ]);
    }
    table
}

fn excerpt(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS - 3).collect();
    format!("{}...", cut)
}

fn page_footer<T>(page: &Page<T>) -> String {
    let shown = page.data().len();
    match (page.page, page.total_pages, page.total_elements.or(page.total)) {
        (Some(p), Some(pages), Some(total)) => {
            format!("Page {} of {} ({} shown, {} total)", p + 1, pages.max(1), shown, total)
        }
        (_, _, Some(total)) => format!("{} shown, {} total", shown, total),
        _ => format!("{} shown", shown),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token_store::MemoryStore;
    use crate::config::ApiConfig;
    use std::sync::Arc;

    fn message(number: i32, content: &str, is_user: bool) -> Message {
        Message {
            id: number as i64,
            content: content.to_string(),
            sources: vec!["https://sdu.edu.kz".to_string()],
            is_user,
            number,
            version: 1,
            created_date: "2024-05-01T10:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_chats_table_has_header_and_rows() {
        let chats = vec![
            Chat {
                id: 1,
                title: "Web".to_string(),
                created_date: "2024-05-01".to_string(),
            },
            Chat {
                id: 2,
                title: "Гранты".to_string(),
                created_date: "2024-05-02".to_string(),
            },
        ];
        let table = chats_table(&chats);
        assert_eq!(table.len(), 3);
        assert!(table.to_string().contains("Гранты"));
    }

    #[test]
    fn test_messages_table_marks_authorship() {
        let table = messages_table(&[message(1, "Привет", true), message(2, "Салем", false)]);
        let rendered = table.to_string();
        assert!(rendered.contains("you"));
        assert!(rendered.contains("assistant"));
    }

    #[test]
    fn test_excerpt_shortens_long_content() {
        let long = "слово ".repeat(40);
        let short = excerpt(&long);
        assert_eq!(short.chars().count(), EXCERPT_CHARS);
        assert!(short.ends_with("..."));
        assert_eq!(excerpt("a\n  b"), "a b");
    }

    #[test]
    fn test_page_footer_variants() {
        let full: Page<Chat> = Page {
            items: Some(Vec::new()),
            content: None,
            page: Some(0),
            size: Some(20),
            total: None,
            total_elements: Some(3),
            total_pages: Some(1),
        };
        assert_eq!(page_footer(&full), "Page 1 of 1 (0 shown, 3 total)");

        let bare: Page<Chat> = Page {
            items: None,
            content: Some(Vec::new()),
            page: None,
            size: None,
            total: None,
            total_elements: None,
            total_pages: None,
        };
        assert_eq!(page_footer(&bare), "0 shown");
    }

    #[test]
    fn test_ensure_signed_in_requires_token() {
        let config = ApiConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            ..ApiConfig::default()
        };
        let api = ApiClient::new(&config, Arc::new(MemoryStore::default())).unwrap();
        assert!(ensure_signed_in(&api).is_err());

        api.set_token(Some("tok")).unwrap();
        assert!(ensure_signed_in(&api).is_ok());
    }
}
