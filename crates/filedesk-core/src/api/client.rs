//! Request pipeline for the file-management REST API.
//!
//! Every call goes through the same steps: attach the current access token,
//! dispatch with a bounded timeout, pass successes through, and on a 401
//! attempt at most one silent token refresh before retrying the call once.
//! Concurrent 401s share a single in-flight refresh.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::{header, Client, Method, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::endpoints;
use super::{ApiError, ApiResult};
use crate::auth::{token, CredentialStore, CredentialUpdate};
use crate::config::Config;
use crate::models::{RefreshRequest, RefreshResponse};

/// Outcome of a refresh, shared by every caller waiting on it.
type RefreshOutcome = std::result::Result<String, Arc<ApiError>>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// A single logical API call, kept intact so it can be re-dispatched.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    session_bound: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            session_bound: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> ApiResult<Self> {
        let value =
            serde_json::to_value(body).map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Mark this call as a credential exchange (login, register, password
    /// reset). A 401 from it rejects the submitted credentials, says nothing
    /// about the current session, and never triggers refresh or clearing.
    pub fn credential_exchange(mut self) -> Self {
        self.session_bound = false;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn can_refresh(&self) -> bool {
        !endpoints::auth::is_refresh(&self.path)
    }
}

/// The access token a failed refresh gave up on, and why. A request sent
/// with that token which comes back 401 after the refresh settled reports
/// the same failure as the callers that waited on it.
#[derive(Debug, Clone)]
struct FailedRefresh {
    access_token: String,
    reason: String,
}

/// Per-call pipeline state. Lives exactly as long as one `execute`.
#[derive(Debug, Default)]
struct CallContext {
    /// Set once this call has been through a refresh cycle
    retried: bool,
    /// Token to attach on the next attempt instead of reading the store
    token_override: Option<String>,
}

/// API client for the file-management service.
/// Clone is cheap: the HTTP pool, credential store and refresh slot are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: CredentialStore,
    refresh_slot: Arc<Mutex<Option<SharedRefresh>>>,
    last_failed_refresh: Arc<Mutex<Option<FailedRefresh>>>,
}

impl ApiClient {
    pub fn new(config: &Config, store: CredentialStore) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            store,
            refresh_slot: Arc::new(Mutex::new(None)),
            last_failed_refresh: Arc::new(Mutex::new(None)),
        })
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn auth_headers(token: Option<&str>) -> ApiResult<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = token {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ApiError::InvalidRequest(format!("Unusable access token: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: Response) -> ApiResult<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> ApiResult<Response> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.url(&request.path))
            .headers(Self::auth_headers(token)?);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        Self::check_response(response).await
    }

    /// Run `request` through the pipeline and return the successful response.
    pub async fn execute(&self, request: ApiRequest) -> ApiResult<Response> {
        let mut call = CallContext::default();

        loop {
            let token = call
                .token_override
                .take()
                .or_else(|| self.store.access_token());

            let err = match self.dispatch(&request, token.as_deref()).await {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if !err.is_unauthorized() || !request.session_bound {
                return Err(err);
            }

            let has_refresh_token = self.store.refresh_token().is_some();
            if has_refresh_token && !call.retried && request.can_refresh() {
                call.retried = true;
                debug!(path = %request.path, "Access token rejected, refreshing");
                let fresh = self.refreshed_access_token(token.as_deref()).await?;
                call.token_override = Some(fresh);
                continue;
            }

            if let Some(reason) = self.failed_refresh_for(token.as_deref()) {
                debug!(path = %request.path, "Token was abandoned by a failed refresh");
                return Err(ApiError::SessionExpired(reason));
            }

            // No viable refresh path. Only drop the session if the token is
            // independently known to be expired.
            let current = self.store.access_token();
            if current.is_some() && token::is_expired(current.as_deref()) {
                info!(path = %request.path, "Expired access token with no refresh path, clearing credentials");
                self.store.clear_credentials();
            }
            return Err(err);
        }
    }

    /// Access token to retry with after `rejected` got a 401.
    ///
    /// Joins the in-flight refresh if there is one. If the token was already
    /// rotated since `rejected` was sent, returns the current one without
    /// another refresh.
    async fn refreshed_access_token(
        &self,
        rejected: Option<&str>,
    ) -> ApiResult<String> {
        let pending = {
            let mut slot = self.refresh_slot.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(in_flight) => in_flight.clone(),
                None => {
                    if let Some(current) = self.store.access_token() {
                        if rejected != Some(current.as_str()) && !token::is_expired(Some(&current)) {
                            debug!("Access token already rotated, retrying with current token");
                            return Ok(current);
                        }
                    }
                    let refresh = self.clone().refresh_tokens().boxed().shared();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        pending
            .await
            .map_err(|e| ApiError::SessionExpired(e.to_string()))
    }

    fn failed_refresh_for(&self, token: Option<&str>) -> Option<String> {
        let token = token?;
        let last = self
            .last_failed_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        last.as_ref()
            .filter(|failed| failed.access_token == token)
            .map(|failed| failed.reason.clone())
    }

    /// The one refresh call, run at most once at a time. Settles the store
    /// and empties the slot before waiters observe the outcome.
    async fn refresh_tokens(self) -> RefreshOutcome {
        let abandoned = self.store.access_token();
        let outcome = self.request_refresh().await;

        let result = match outcome {
            Ok(refreshed) => {
                info!("Access token refreshed");
                let access_token = refreshed.access_token.clone();
                self.store.set_credentials(CredentialUpdate::tokens(
                    refreshed.access_token,
                    refreshed.refresh_token,
                ));
                *self
                    .last_failed_refresh
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = None;
                Ok(access_token)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing credentials");
                // Recorded before clearing so a late 401 never sees an empty
                // store without the reason
                if let Some(access_token) = abandoned {
                    *self
                        .last_failed_refresh
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(FailedRefresh {
                        access_token,
                        reason: e.to_string(),
                    });
                }
                self.store.clear_credentials();
                Err(Arc::new(e))
            }
        };

        *self.refresh_slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        result
    }

    /// POST the refresh token straight to the refresh endpoint, outside the
    /// pipeline so a failing refresh cannot recurse.
    async fn request_refresh(&self) -> ApiResult<RefreshResponse> {
        let refresh_token = self
            .store
            .refresh_token()
            .ok_or_else(|| ApiError::SessionExpired("No refresh token available".to_string()))?;

        let response = self
            .client
            .post(self.url(endpoints::auth::REFRESH_TOKEN))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        Ok(response.json().await?)
    }

    // ===== Typed helpers =====

    /// Execute and decode a JSON response body.
    pub async fn send<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> ApiResult<T> {
        let path = request.path.clone();
        let response = self.execute(request).await?;
        response.json().await.map_err(|e| {
            warn!(path = %path, error = %e, "Failed to decode response");
            ApiError::from(e)
        })
    }

    /// Execute and discard the response body.
    pub async fn send_empty(&self, request: ApiRequest) -> ApiResult<()> {
        self.execute(request).await?;
        Ok(())
    }

    /// Execute and return the raw response bytes.
    pub async fn send_bytes(&self, request: ApiRequest) -> ApiResult<Vec<u8>> {
        let response = self.execute(request).await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.send(ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        self.send(ApiRequest::put(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> ApiResult<()> {
        self.send_empty(ApiRequest::delete(path)).await
    }
}
