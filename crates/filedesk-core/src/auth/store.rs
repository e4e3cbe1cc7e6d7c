//! The credential store: current tokens and user for this process.
//!
//! One `CredentialStore` is built by the application and cloned into every
//! component that needs it; clones share the same state. Each mutator runs
//! under a single write lock, so readers never see half an update. Token
//! changes are mirrored to durable storage as part of the same mutation.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, warn};

use super::storage::{StorageKey, TokenStorage};
use super::token;
use crate::models::User;

/// A point-in-time copy of the stored credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

impl Credentials {
    /// Recomputed on every call; there is no cached flag to go stale.
    pub fn is_authenticated(&self) -> bool {
        !token::is_expired(self.access_token.as_deref())
    }
}

/// Fields to replace in `CredentialStore::set_credentials`. `None` leaves the
/// current value alone.
#[derive(Debug, Clone, Default)]
pub struct CredentialUpdate {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

impl CredentialUpdate {
    pub fn tokens(access_token: String, refresh_token: Option<String>) -> Self {
        Self {
            access_token: Some(access_token),
            refresh_token,
            user: None,
        }
    }
}

#[derive(Clone)]
pub struct CredentialStore {
    state: Arc<RwLock<Credentials>>,
    storage: Arc<dyn TokenStorage>,
}

impl CredentialStore {
    /// Build the store, rehydrating tokens from `storage`. The user record
    /// starts absent until a sign-in or profile fetch fills it.
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        let access_token = Self::read_entry(storage.as_ref(), StorageKey::AccessToken);
        let refresh_token = Self::read_entry(storage.as_ref(), StorageKey::RefreshToken);

        let state = Credentials {
            access_token,
            refresh_token,
            user: None,
        };
        debug!(
            has_access = state.access_token.is_some(),
            has_refresh = state.refresh_token.is_some(),
            authenticated = state.is_authenticated(),
            "Credential store initialized"
        );

        Self {
            state: Arc::new(RwLock::new(state)),
            storage,
        }
    }

    fn read_entry(storage: &dyn TokenStorage, key: StorageKey) -> Option<String> {
        match storage.get(key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read stored token");
                None
            }
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Credentials> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Credentials> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Storage failures never roll back memory; the in-memory copy stays
    // authoritative for this process.
    fn persist(&self, key: StorageKey, value: &str) {
        if let Err(e) = self.storage.set(key, value) {
            warn!(key = %key, error = %e, "Failed to persist token");
        }
    }

    fn unpersist(&self, key: StorageKey) {
        if let Err(e) = self.storage.remove(key) {
            warn!(key = %key, error = %e, "Failed to remove stored token");
        }
    }

    /// Replace the provided fields and persist any provided tokens.
    pub fn set_credentials(&self, update: CredentialUpdate) {
        let mut state = self.write();

        if let Some(access_token) = update.access_token {
            self.persist(StorageKey::AccessToken, &access_token);
            state.access_token = Some(access_token);
        }
        if let Some(refresh_token) = update.refresh_token {
            self.persist(StorageKey::RefreshToken, &refresh_token);
            state.refresh_token = Some(refresh_token);
        }
        if let Some(user) = update.user {
            state.user = Some(user);
        }

        debug!(authenticated = state.is_authenticated(), "Credentials updated");
    }

    /// Drop all credentials and their durable copies. Idempotent.
    pub fn clear_credentials(&self) {
        let mut state = self.write();
        *state = Credentials::default();
        for key in StorageKey::ALL {
            self.unpersist(key);
        }
        debug!("Credentials cleared");
    }

    /// Replace the user record only.
    pub fn set_user(&self, user: User) {
        self.write().user = Some(user);
    }

    pub fn snapshot(&self) -> Credentials {
        self.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_authenticated()
    }
}
