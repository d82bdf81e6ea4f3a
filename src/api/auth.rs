//! Secret storage for the auth token pair, cached user and device id.
//!
//! The production store is the OS keychain via the `keyring` crate; secrets
//! never touch plain files. [`MemoryStore`] backs tests and ephemeral
//! sessions.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::StoreError;

/// Keychain service name shared by all entries.
pub const SERVICE_NAME: &str = "com.theraforge";

/// Named secrets the client persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKey {
    /// JSON-encoded [`AuthToken`](crate::api::token::AuthToken).
    Auth,
    /// Stable per-install identifier sent as the `Client` header.
    VendorId,
    /// JSON-encoded [`User`](crate::api::types::User).
    User,
}

impl SecretKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretKey::Auth => "auth",
            SecretKey::VendorId => "vendorID",
            SecretKey::User => "user",
        }
    }
}

/// Named-key string store.
pub trait SecretStore: Send + Sync {
    /// Returns `None` when no entry exists.
    fn load(&self, key: SecretKey) -> Result<Option<String>, StoreError>;

    fn save(&self, key: SecretKey, value: &str) -> Result<(), StoreError>;

    /// Idempotent: removing a missing entry succeeds.
    fn remove(&self, key: SecretKey) -> Result<(), StoreError>;
}

/// OS keychain store.
#[cfg(feature = "keychain")]
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

#[cfg(feature = "keychain")]
impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: SecretKey) -> Result<keyring::Entry, StoreError> {
        Ok(keyring::Entry::new(&self.service, key.as_str())?)
    }
}

#[cfg(feature = "keychain")]
impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "keychain")]
impl SecretStore for KeyringStore {
    fn load(&self, key: SecretKey) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StoreError::from(e)),
        }
    }

    fn save(&self, key: SecretKey, value: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: SecretKey) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()), // already gone
            Err(e) => Err(StoreError::from(e)),
        }
    }
}

/// In-process store. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<SecretKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<SecretKey, String>>, StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::OperationFailed("memory store lock poisoned".to_string()))
    }
}

impl SecretStore for MemoryStore {
    fn load(&self, key: SecretKey) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(&key).cloned())
    }

    fn save(&self, key: SecretKey, value: &str) -> Result<(), StoreError> {
        self.lock()?.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: SecretKey) -> Result<(), StoreError> {
        self.lock()?.remove(&key);
        Ok(())
    }
}

impl<S: SecretStore + ?Sized> SecretStore for std::sync::Arc<S> {
    fn load(&self, key: SecretKey) -> Result<Option<String>, StoreError> {
        (**self).load(key)
    }

    fn save(&self, key: SecretKey, value: &str) -> Result<(), StoreError> {
        (**self).save(key, value)
    }

    fn remove(&self, key: SecretKey) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        assert_eq!(SecretKey::Auth.as_str(), "auth");
        assert_eq!(SecretKey::VendorId.as_str(), "vendorID");
        assert_eq!(SecretKey::User.as_str(), "user");
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.load(SecretKey::Auth).unwrap(), None);

        store.save(SecretKey::Auth, "{}").unwrap();
        assert_eq!(store.load(SecretKey::Auth).unwrap().as_deref(), Some("{}"));

        store.remove(SecretKey::Auth).unwrap();
        assert_eq!(store.load(SecretKey::Auth).unwrap(), None);

        // idempotent
        store.remove(SecretKey::Auth).unwrap();
    }
}
