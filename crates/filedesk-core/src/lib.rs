//! Filedesk core: the authenticated API session for the file-management
//! service.
//!
//! - `auth`: token expiry decoding, durable token storage, the credential store
//! - `api`: the request pipeline (bearer attach, single-flight refresh) and typed calls
//! - `session`: sign-in, sign-up, sign-out and profile actions
//! - `models`, `config`, `utils`: wire types, settings and display helpers

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod session;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{ApiClient, ApiError, ApiRequest, ApiResult};
pub use auth::{CredentialStore, CredentialUpdate, Credentials};
pub use config::{Config, StorageBackend};
pub use session::{Action, ActionError, ActionPhase, ActionStatus, Session};
