//! Fixtures shared by the unit tests.

use std::sync::Arc;

use crate::api::ApiClient;
use crate::auth::{CredentialStore, MemoryStorage};
use crate::config::Config;
use crate::models::User;

pub fn sample_user(id: &str) -> User {
    User {
        id: id.to_string(),
        username: "bob".into(),
        email: "bob@example.com".into(),
        full_name: "Bob Builder".into(),
        avatar: None,
        role: "USER".into(),
        created_at: "2024-01-01T00:00:00Z".into(),
        updated_at: "2024-01-01T00:00:00Z".into(),
    }
}

pub fn sample_user_json(id: &str) -> serde_json::Value {
    serde_json::to_value(sample_user(id)).unwrap()
}

/// A store over fresh in-memory storage, plus that storage for assertions.
pub fn memory_store() -> (CredentialStore, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    (CredentialStore::new(storage.clone()), storage)
}

/// A pipeline pointed at a mock server.
pub fn client_for(server_url: &str, store: &CredentialStore) -> ApiClient {
    let config = Config {
        api_base_url: server_url.to_string(),
        ..Config::default()
    };
    ApiClient::new(&config, store.clone()).unwrap()
}
