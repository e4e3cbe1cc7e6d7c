//! REST API client module for the file-management service.
//!
//! `ApiClient` is the request pipeline every call goes through: it attaches
//! the bearer token from the credential store and transparently refreshes
//! it when the server answers 401. `resources` holds the typed calls the
//! dashboard and admin screens make.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod resources;

pub use client::{ApiClient, ApiRequest};
pub use error::{ApiError, ApiResult, ResponseDetail};
