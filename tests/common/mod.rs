use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::MockServer;

use sduchat::api::ApiClient;
use sduchat::auth::MemoryStore;
use sduchat::config::ApiConfig;

/// Client pointed at `server` with an empty in-memory credential store.
#[allow(dead_code)]
pub fn api_client(server: &MockServer) -> (ApiClient, Arc<MemoryStore>) {
    api_client_with(server, None, Arc::new(MemoryStore::default()))
}

/// Client pointed at `server` with an optional public bearer and the given store.
#[allow(dead_code)]
pub fn api_client_with(
    server: &MockServer,
    static_bearer: Option<&str>,
    store: Arc<MemoryStore>,
) -> (ApiClient, Arc<MemoryStore>) {
    let config = ApiConfig {
        base_url: format!("{}/api", server.uri()),
        static_bearer: static_bearer.map(str::to_string),
        timeout_seconds: 5,
    };
    let client = ApiClient::new(&config, store.clone()).expect("client should build");
    (client, store)
}

/// Server message JSON.
#[allow(dead_code)]
pub fn message_json(id: i64, content: &str, is_user: bool, number: i32) -> Value {
    json!({
        "id": id,
        "content": content,
        "sources": [],
        "user": is_user,
        "number": number,
        "version": 1,
        "createdDate": "2024-05-01T10:00:00Z"
    })
}

/// Canonical send-result JSON carrying an assistant reply.
#[allow(dead_code)]
pub fn send_result_json(chat_id: i64, message_id: i64, content: &str) -> Value {
    json!({
        "chatId": chat_id,
        "title": "Расписание",
        "messageResponse": message_json(message_id, content, false, 2),
        "createdDate": "2024-05-01T10:00:00Z"
    })
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}
