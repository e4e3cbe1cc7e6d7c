//! Authentication state for the API session.
//!
//! This module provides:
//! - `token`: expiry decoding for bearer tokens, without a server round-trip
//! - `TokenStorage`: durable homes for the two tokens (file, OS keychain, memory)
//! - `CredentialStore`: the process-wide access/refresh token and user record
//!
//! Tokens survive restarts through the configured storage backend; the user
//! record does not and is refetched after startup.

pub mod storage;
pub mod store;
pub mod token;

pub use storage::{FileStorage, KeyringStorage, MemoryStorage, StorageKey, TokenStorage};
pub use store::{CredentialStore, CredentialUpdate, Credentials};
pub use token::{decode_claims, is_expired, TokenClaims};
