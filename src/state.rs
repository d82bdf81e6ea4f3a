//! Session state: the cached auth token and user on top of the secret store.
//!
//! Lookup order is explicit: in-memory cache, then the store, then absent.
//! Every mutation writes through the store first and only then updates the
//! cache, so a failed store write never leaves the cache ahead of it.

use tokio::sync::{Mutex, MutexGuard, RwLock};
use zeroize::Zeroize;

use crate::api::auth::{SecretKey, SecretStore};
use crate::api::token::AuthToken;
use crate::api::types::User;
use crate::error::StoreError;

pub struct Session<S: SecretStore> {
    store: S,
    token: RwLock<Option<AuthToken>>,
    vendor_id: RwLock<Option<String>>,
    /// Held while a token refresh is in flight.
    refresh_lock: Mutex<()>,
}

impl<S: SecretStore> Session<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            token: RwLock::new(None),
            vendor_id: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current token: cache, else store (populating the cache), else `None`.
    pub async fn token(&self) -> Result<Option<AuthToken>, StoreError> {
        if let Some(ref token) = *self.token.read().await {
            return Ok(Some(token.clone()));
        }

        let Some(raw) = self.store.load(SecretKey::Auth)? else {
            return Ok(None);
        };
        let token: AuthToken = serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
            key: SecretKey::Auth.as_str().to_string(),
            source,
        })?;

        *self.token.write().await = Some(token.clone());
        Ok(Some(token))
    }

    /// Replace the token pair. On store failure the previous token stays.
    pub async fn set_token(&self, token: &AuthToken) -> Result<(), StoreError> {
        let json = serde_json::to_string(token).map_err(|source| StoreError::Corrupt {
            key: SecretKey::Auth.as_str().to_string(),
            source,
        })?;
        self.store.save(SecretKey::Auth, &json)?;

        let mut cached = self.token.write().await;
        if let Some(ref mut old) = *cached {
            old.zeroize();
        }
        *cached = Some(token.clone());
        Ok(())
    }

    /// Cached user profile from the last successful login or refresh.
    pub fn user(&self) -> Result<Option<User>, StoreError> {
        let Some(raw) = self.store.load(SecretKey::User)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: SecretKey::User.as_str().to_string(),
                source,
            })
    }

    pub fn set_user(&self, user: &User) -> Result<(), StoreError> {
        let json = serde_json::to_string(user).map_err(|source| StoreError::Corrupt {
            key: SecretKey::User.as_str().to_string(),
            source,
        })?;
        self.store.save(SecretKey::User, &json)
    }

    /// Store a freshly issued token together with its user.
    ///
    /// The user is written first. If the token write then fails the previous
    /// user entry is put back, so a failure leaves the old session intact.
    pub async fn set_session(&self, token: &AuthToken, user: &User) -> Result<(), StoreError> {
        let previous_user = self.store.load(SecretKey::User)?;
        self.set_user(user)?;

        if let Err(e) = self.set_token(token).await {
            let restored = match previous_user {
                Some(raw) => self.store.save(SecretKey::User, &raw),
                None => self.store.remove(SecretKey::User),
            };
            if let Err(restore_err) = restored {
                log::warn!("Failed to restore previous user entry: {}", restore_err);
            }
            return Err(e);
        }
        Ok(())
    }

    /// Drop token and user from both store and cache.
    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(SecretKey::Auth)?;
        self.store.remove(SecretKey::User)?;

        let mut cached = self.token.write().await;
        if let Some(ref mut old) = *cached {
            old.zeroize();
        }
        *cached = None;
        Ok(())
    }

    /// Stable device identifier, generated and persisted on first use.
    pub async fn vendor_id(&self) -> Result<String, StoreError> {
        if let Some(ref id) = *self.vendor_id.read().await {
            return Ok(id.clone());
        }

        let mut cached = self.vendor_id.write().await;
        if let Some(ref id) = *cached {
            return Ok(id.clone());
        }

        let id = match self.store.load(SecretKey::VendorId)? {
            Some(id) => id,
            None => {
                let id = uuid::Uuid::new_v4().to_string().to_uppercase();
                self.store.save(SecretKey::VendorId, &id)?;
                log::info!("Generated new device identifier");
                id
            }
        };
        *cached = Some(id.clone());
        Ok(id)
    }

    /// Serialize refreshes. Callers re-check validity after acquiring.
    pub async fn lock_refresh(&self) -> MutexGuard<'_, ()> {
        self.refresh_lock.lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::auth::MemoryStore;
    use crate::api::types::UserType;
    use chrono::{Duration, Utc};

    /// Store whose writes always fail.
    struct ReadOnlyStore(MemoryStore);

    impl SecretStore for ReadOnlyStore {
        fn load(&self, key: SecretKey) -> Result<Option<String>, StoreError> {
            self.0.load(key)
        }
        fn save(&self, _key: SecretKey, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::OperationFailed("read-only".to_string()))
        }
        fn remove(&self, _key: SecretKey) -> Result<(), StoreError> {
            Err(StoreError::OperationFailed("read-only".to_string()))
        }
    }

    /// Store whose writes fail for one key only.
    struct FailingKeyStore {
        inner: MemoryStore,
        failing: SecretKey,
    }

    impl SecretStore for FailingKeyStore {
        fn load(&self, key: SecretKey) -> Result<Option<String>, StoreError> {
            self.inner.load(key)
        }
        fn save(&self, key: SecretKey, value: &str) -> Result<(), StoreError> {
            if key == self.failing {
                return Err(StoreError::OperationFailed("unavailable".to_string()));
            }
            self.inner.save(key, value)
        }
        fn remove(&self, key: SecretKey) -> Result<(), StoreError> {
            self.inner.remove(key)
        }
    }

    fn token(name: &str) -> AuthToken {
        AuthToken::new(name, format!("{}-refresh", name), Utc::now() + Duration::hours(1))
    }

    fn user() -> User {
        User {
            id: "u1".into(),
            email: "a@b.c".into(),
            first_name: None,
            last_name: None,
            gender: None,
            dob: None,
            user_type: UserType::Patient,
        }
    }

    #[tokio::test]
    async fn test_token_absent() {
        let session = Session::new(MemoryStore::new());
        assert!(session.token().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_token_falls_back_to_store() {
        let store = MemoryStore::new();
        store
            .save(SecretKey::Auth, &serde_json::to_string(&token("stored")).unwrap())
            .unwrap();
        let session = Session::new(store);

        let loaded = session.token().await.unwrap().unwrap();
        assert_eq!(loaded.token, "stored");
    }

    #[tokio::test]
    async fn test_set_token_writes_through() {
        let session = Session::new(MemoryStore::new());
        session.set_token(&token("fresh")).await.unwrap();

        let raw = session.store().load(SecretKey::Auth).unwrap().unwrap();
        let persisted: AuthToken = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.token, "fresh");
        assert_eq!(session.token().await.unwrap().unwrap().token, "fresh");
    }

    #[tokio::test]
    async fn test_failed_write_keeps_old_token() {
        let inner = MemoryStore::new();
        inner
            .save(SecretKey::Auth, &serde_json::to_string(&token("old")).unwrap())
            .unwrap();
        let session = Session::new(ReadOnlyStore(inner));
        assert_eq!(session.token().await.unwrap().unwrap().token, "old");

        assert!(session.set_token(&token("new")).await.is_err());
        assert_eq!(session.token().await.unwrap().unwrap().token, "old");
    }

    #[tokio::test]
    async fn test_corrupt_token_is_an_error() {
        let store = MemoryStore::new();
        store.save(SecretKey::Auth, "not json").unwrap();
        let session = Session::new(store);
        assert!(matches!(
            session.token().await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_clear_removes_token_and_user() {
        let session = Session::new(MemoryStore::new());
        session.set_token(&token("t")).await.unwrap();
        session.set_user(&user()).unwrap();
        assert_eq!(session.user().unwrap().unwrap().id, "u1");

        session.clear().await.unwrap();
        assert!(session.token().await.unwrap().is_none());
        assert!(session.user().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_session_stores_token_and_user() {
        let session = Session::new(MemoryStore::new());
        session.set_session(&token("t"), &user()).await.unwrap();

        assert_eq!(session.token().await.unwrap().unwrap().token, "t");
        assert_eq!(session.user().unwrap().unwrap().id, "u1");
    }

    #[tokio::test]
    async fn test_set_session_token_failure_restores_previous_user() {
        let inner = MemoryStore::new();
        let previous = User {
            id: "u0".into(),
            ..user()
        };
        inner
            .save(SecretKey::User, &serde_json::to_string(&previous).unwrap())
            .unwrap();
        let session = Session::new(FailingKeyStore {
            inner,
            failing: SecretKey::Auth,
        });

        assert!(session.set_session(&token("t"), &user()).await.is_err());
        assert!(session.token().await.unwrap().is_none());
        assert_eq!(session.user().unwrap().unwrap().id, "u0");
    }

    #[tokio::test]
    async fn test_set_session_token_failure_without_previous_user() {
        let session = Session::new(FailingKeyStore {
            inner: MemoryStore::new(),
            failing: SecretKey::Auth,
        });

        assert!(session.set_session(&token("t"), &user()).await.is_err());
        assert!(session.user().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_session_user_failure_keeps_old_token() {
        let inner = MemoryStore::new();
        inner
            .save(SecretKey::Auth, &serde_json::to_string(&token("old")).unwrap())
            .unwrap();
        let session = Session::new(FailingKeyStore {
            inner,
            failing: SecretKey::User,
        });

        assert!(session.set_session(&token("new"), &user()).await.is_err());
        assert_eq!(session.token().await.unwrap().unwrap().token, "old");
    }

    #[tokio::test]
    async fn test_vendor_id_is_stable() {
        let session = Session::new(MemoryStore::new());
        let first = session.vendor_id().await.unwrap();
        let second = session.vendor_id().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            session.store().load(SecretKey::VendorId).unwrap().as_deref(),
            Some(first.as_str())
        );
    }

    #[tokio::test]
    async fn test_vendor_id_reuses_stored_value() {
        let store = MemoryStore::new();
        store.save(SecretKey::VendorId, "DEVICE-1").unwrap();
        let session = Session::new(store);
        assert_eq!(session.vendor_id().await.unwrap(), "DEVICE-1");
    }
}
