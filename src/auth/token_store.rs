//! Credential persistence
//!
//! The API client keeps its access token in a [`CredentialStore`], a small
//! key-value capability with `get`, `set` and `delete`. Production code uses
//! [`KeyringStore`], backed by the operating system's native credential
//! store (Keychain on macOS, Secret Service on Linux, Windows Credential
//! Manager on Windows). [`MemoryStore`] keeps values in process memory and is
//! used by tests and `--ephemeral` runs.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, SduChatError};

/// Key under which the API access token is stored.
pub const ACCESS_TOKEN_KEY: &str = "auth.accessToken";

/// Key-value access to secure credential storage.
///
/// Implementations must treat deleting an absent key as a no-op and report
/// an absent key from `get` as `Ok(None)` rather than an error.
pub trait CredentialStore: Send + Sync {
    /// Returns the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removes the value stored under `key`.
    fn delete(&self, key: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// KeyringStore
// ---------------------------------------------------------------------------

/// Accessor for the OS native keyring.
///
/// Every key becomes a separate keyring entry under the configured service
/// name, with the key as the entry's user name.
///
/// # Examples
///
/// ```no_run
/// use sduchat::auth::token_store::{CredentialStore, KeyringStore, ACCESS_TOKEN_KEY};
///
/// # fn example() -> sduchat::error::Result<()> {
/// let store = KeyringStore::new("sduchat");
/// store.set(ACCESS_TOKEN_KEY, "token")?;
/// assert_eq!(store.get(ACCESS_TOKEN_KEY)?.as_deref(), Some("token"));
/// store.delete(ACCESS_TOKEN_KEY)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    /// Creates a store that namespaces its entries under `service`.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key).map_err(|e| SduChatError::Keyring(e).into())
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(SduChatError::Keyring(e).into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(SduChatError::Keyring)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_password() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SduChatError::Keyring(e).into()),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process credential store.
///
/// # Examples
///
/// ```
/// use sduchat::auth::token_store::{CredentialStore, MemoryStore};
///
/// let store = MemoryStore::default();
/// store.set("k", "v").unwrap();
/// assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));
/// store.delete("k").unwrap();
/// assert!(store.get("k").unwrap().is_none());
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates a store pre-populated with a single entry.
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::default();
        if let Ok(mut values) = store.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        store
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| SduChatError::CredentialStore("memory store poisoned".to_string()).into())
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_get_absent_is_none() {
        let store = MemoryStore::default();
        assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn test_memory_store_set_overwrites() {
        let store = MemoryStore::default();
        store.set(ACCESS_TOKEN_KEY, "first").unwrap();
        store.set(ACCESS_TOKEN_KEY, "second").unwrap();
        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).unwrap().as_deref(),
            Some("second")
        );
    }

    #[test]
    fn test_memory_store_delete_is_idempotent() {
        let store = MemoryStore::with_entry(ACCESS_TOKEN_KEY, "tok");
        store.delete(ACCESS_TOKEN_KEY).unwrap();
        store.delete(ACCESS_TOKEN_KEY).unwrap();
        assert!(store.get(ACCESS_TOKEN_KEY).unwrap().is_none());
    }

    #[test]
    fn test_memory_store_keys_are_independent() {
        let store = MemoryStore::with_entry("a", "1");
        store.set("b", "2").unwrap();
        store.delete("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
        assert_eq!(store.get("b").unwrap().as_deref(), Some("2"));
    }

    // -----------------------------------------------------------------------
    // Keyring integration tests  (require system keyring; skipped in CI)
    // -----------------------------------------------------------------------

    #[test]
    #[ignore = "requires system keyring"]
    fn test_keyring_store_roundtrip() {
        let store = KeyringStore::new("sduchat-test");
        store.set(ACCESS_TOKEN_KEY, "integration").expect("set");
        assert_eq!(
            store.get(ACCESS_TOKEN_KEY).expect("get").as_deref(),
            Some("integration")
        );
        store.delete(ACCESS_TOKEN_KEY).expect("delete");
        assert!(store.get(ACCESS_TOKEN_KEY).expect("get").is_none());
    }

    #[test]
    #[ignore = "requires system keyring"]
    fn test_keyring_delete_is_idempotent() {
        let store = KeyringStore::new("sduchat-test-idempotent");
        store.delete(ACCESS_TOKEN_KEY).expect("first delete");
        store.delete(ACCESS_TOKEN_KEY).expect("second delete is no-op");
    }
}
