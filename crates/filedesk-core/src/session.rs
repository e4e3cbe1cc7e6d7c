//! Session actions: sign-in, sign-up, sign-out and profile maintenance.
//!
//! Each action calls the API through the pipeline and reconciles the result
//! into the credential store. Progress is published on a watch channel as
//! `Pending`, then `Fulfilled` or `Rejected`, so a UI can show loading and
//! error states without polling.

use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::endpoints::{auth, users};
use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::auth::{CredentialStore, CredentialUpdate};
use crate::models::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, LoginResponse, RegisterRequest,
    ResetPasswordRequest, UpdateProfileRequest, User,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SignIn,
    SignUp,
    SignOut,
    FetchProfile,
    UpdateProfile,
    ChangePassword,
    ForgotPassword,
    ResetPassword,
}

impl Action {
    /// Reason reported when the server gives no message of its own.
    pub fn fallback_reason(&self) -> &'static str {
        match self {
            Action::SignIn => "Login failed",
            Action::SignUp => "Registration failed",
            Action::SignOut => "Logout failed",
            Action::FetchProfile => "Failed to load profile",
            Action::UpdateProfile => "Failed to update profile",
            Action::ChangePassword => "Failed to change password",
            Action::ForgotPassword => "Failed to request password reset",
            Action::ResetPassword => "Failed to reset password",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionPhase {
    Idle,
    Pending,
    Fulfilled,
    Rejected(String),
}

/// Latest phase of the most recent action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionStatus {
    pub action: Option<Action>,
    pub phase: ActionPhase,
}

impl Default for ActionStatus {
    fn default() -> Self {
        Self {
            action: None,
            phase: ActionPhase::Idle,
        }
    }
}

impl ActionStatus {
    pub fn is_loading(&self) -> bool {
        self.phase == ActionPhase::Pending
    }

    pub fn error(&self) -> Option<&str> {
        match self.phase {
            ActionPhase::Rejected(ref reason) => Some(reason),
            _ => None,
        }
    }
}

/// The rejected outcome of an action.
#[derive(Error, Debug)]
#[error("{reason}")]
pub struct ActionError {
    pub action: Action,
    /// Server message, or the action's fallback reason
    pub reason: String,
    #[source]
    pub source: ApiError,
}

pub type ActionResult<T> = std::result::Result<T, ActionError>;

pub struct Session {
    api: ApiClient,
    status: watch::Sender<ActionStatus>,
}

impl Session {
    pub fn new(api: ApiClient) -> Self {
        let (status, _) = watch::channel(ActionStatus::default());
        Self { api, status }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &CredentialStore {
        self.api.store()
    }

    pub fn subscribe(&self) -> watch::Receiver<ActionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> ActionStatus {
        self.status.borrow().clone()
    }

    fn begin(&self, action: Action) {
        self.status.send_replace(ActionStatus {
            action: Some(action),
            phase: ActionPhase::Pending,
        });
    }

    fn fulfill(&self, action: Action) {
        self.status.send_replace(ActionStatus {
            action: Some(action),
            phase: ActionPhase::Fulfilled,
        });
    }

    fn reject(&self, action: Action, source: ApiError) -> ActionError {
        let reason = source.reason_or(action.fallback_reason());
        warn!(?action, error = %source, "Action rejected");
        self.status.send_replace(ActionStatus {
            action: Some(action),
            phase: ActionPhase::Rejected(reason.clone()),
        });
        ActionError {
            action,
            reason,
            source,
        }
    }

    /// Sign in and store the returned tokens and user. A rejected sign-in
    /// leaves the credential store exactly as it was.
    pub async fn sign_in(&self, username: &str, password: &str) -> ActionResult<User> {
        let action = Action::SignIn;
        self.begin(action);

        let request = ApiRequest::post(auth::LOGIN)
            .json(&LoginRequest::new(username, password))
            .map_err(|e| self.reject(action, e))?
            .credential_exchange();

        let login: LoginResponse = match self.api.send(request).await {
            Ok(login) => login,
            Err(e) => return Err(self.reject(action, e)),
        };

        let user = login.user.clone();
        self.store().set_credentials(CredentialUpdate {
            access_token: Some(login.access_token),
            refresh_token: Some(login.refresh_token),
            user: Some(login.user),
        });

        info!(user_id = %user.id, "Signed in");
        self.fulfill(action);
        Ok(user)
    }

    /// Register an account. Does not sign in.
    pub async fn sign_up(&self, request: &RegisterRequest) -> ActionResult<()> {
        let action = Action::SignUp;
        self.begin(action);

        let request = ApiRequest::post(auth::REGISTER)
            .json(request)
            .map_err(|e| self.reject(action, e))?
            .credential_exchange();

        match self.api.send_empty(request).await {
            Ok(()) => {
                self.fulfill(action);
                Ok(())
            }
            Err(e) => Err(self.reject(action, e)),
        }
    }

    /// Tell the server, then clear local credentials whatever it answered.
    pub async fn sign_out(&self) -> ActionResult<()> {
        let action = Action::SignOut;
        self.begin(action);

        let result = self.api.send_empty(ApiRequest::post(auth::LOGOUT)).await;
        self.store().clear_credentials();

        match result {
            Ok(()) => {
                info!("Signed out");
                self.fulfill(action);
                Ok(())
            }
            Err(e) => Err(self.reject(action, e)),
        }
    }

    /// Load the signed-in user's profile into the store.
    pub async fn fetch_profile(&self) -> ActionResult<User> {
        let action = Action::FetchProfile;
        self.begin(action);

        match self.api.get::<User>(users::PROFILE).await {
            Ok(user) => {
                self.store().set_user(user.clone());
                self.fulfill(action);
                Ok(user)
            }
            Err(e) => Err(self.reject(action, e)),
        }
    }

    /// Update the profile; the server's copy replaces the stored user.
    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> ActionResult<User> {
        let action = Action::UpdateProfile;
        self.begin(action);

        match self.api.put::<User, _>(users::PROFILE, request).await {
            Ok(user) => {
                self.store().set_user(user.clone());
                self.fulfill(action);
                Ok(user)
            }
            Err(e) => Err(self.reject(action, e)),
        }
    }

    pub async fn change_password(&self, current: &str, new: &str) -> ActionResult<()> {
        let action = Action::ChangePassword;
        self.begin(action);

        let body = ChangePasswordRequest {
            current_password: current.to_string(),
            new_password: new.to_string(),
        };
        let request = ApiRequest::post(users::CHANGE_PASSWORD)
            .json(&body)
            .map_err(|e| self.reject(action, e))?;

        self.finish_empty(action, request).await
    }

    pub async fn forgot_password(&self, email: &str) -> ActionResult<()> {
        let action = Action::ForgotPassword;
        self.begin(action);

        let body = ForgotPasswordRequest {
            email: email.to_string(),
        };
        let request = ApiRequest::post(auth::FORGOT_PASSWORD)
            .json(&body)
            .map_err(|e| self.reject(action, e))?
            .credential_exchange();

        self.finish_empty(action, request).await
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> ActionResult<()> {
        let action = Action::ResetPassword;
        self.begin(action);

        let body = ResetPasswordRequest {
            token: token.to_string(),
            new_password: new_password.to_string(),
        };
        let request = ApiRequest::post(auth::RESET_PASSWORD)
            .json(&body)
            .map_err(|e| self.reject(action, e))?
            .credential_exchange();

        self.finish_empty(action, request).await
    }

    async fn finish_empty(&self, action: Action, request: ApiRequest) -> ActionResult<()> {
        match self.api.send_empty(request).await {
            Ok(()) => {
                self.fulfill(action);
                Ok(())
            }
            Err(e) => Err(self.reject(action, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::token_expiring_in;
    use crate::auth::{StorageKey, TokenStorage};
    use crate::test_support::{client_for, memory_store, sample_user, sample_user_json};
    use mockito::Matcher;
    use serde_json::json;

    fn session_for(server: &mockito::Server) -> (Session, std::sync::Arc<crate::auth::MemoryStorage>) {
        let (store, storage) = memory_store();
        (Session::new(client_for(&server.url(), &store)), storage)
    }

    #[tokio::test]
    async fn test_sign_in_stores_credentials() {
        let mut server = mockito::Server::new_async().await;
        let access = token_expiring_in(900);
        let mock = server
            .mock("POST", "/auth/login")
            .match_body(Matcher::Json(json!({ "username": "bob", "password": "secret" })))
            .with_status(200)
            .with_body(
                json!({
                    "accessToken": access,
                    "refreshToken": "r1",
                    "user": sample_user_json("1"),
                })
                .to_string(),
            )
            .create_async()
            .await;

        let (session, storage) = session_for(&server);
        let mut status = session.subscribe();

        let user = session.sign_in("bob", "secret").await.unwrap();
        assert_eq!(user.id, "1");
        mock.assert_async().await;

        let store = session.store();
        assert!(store.is_authenticated());
        assert_eq!(store.user().unwrap().id, "1");
        assert_eq!(storage.get(StorageKey::AccessToken).unwrap(), Some(access));
        assert_eq!(storage.get(StorageKey::RefreshToken).unwrap().as_deref(), Some("r1"));

        assert!(status.has_changed().unwrap());
        let latest = status.borrow_and_update().clone();
        assert_eq!(latest.action, Some(Action::SignIn));
        assert_eq!(latest.phase, ActionPhase::Fulfilled);
    }

    #[tokio::test]
    async fn test_sign_in_rejection_leaves_store_untouched() {
        let mut server = mockito::Server::new_async().await;
        let _login = server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body(r#"{"message":"Invalid credentials"}"#)
            .create_async()
            .await;
        let refresh = server
            .mock("POST", "/auth/refresh-token")
            .expect(0)
            .create_async()
            .await;

        let (session, _) = session_for(&server);
        // An earlier, already expired session with a refresh token
        session.store().set_credentials(CredentialUpdate {
            access_token: Some(token_expiring_in(-30)),
            refresh_token: Some("r0".into()),
            user: Some(sample_user("0")),
        });
        let before = session.store().snapshot();

        let err = session.sign_in("bob", "wrong").await.unwrap_err();
        assert_eq!(err.reason, "Invalid credentials");
        assert_eq!(err.action, Action::SignIn);
        assert!(err.source.is_unauthorized());

        assert_eq!(session.store().snapshot(), before);
        assert_eq!(session.status().error(), Some("Invalid credentials"));
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_sign_in_network_failure_uses_fallback() {
        // Nothing listens on the reserved port once the listener is dropped
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let (store, _) = memory_store();
        let session = Session::new(client_for(&format!("http://{}", addr), &store));

        let err = session.sign_in("bob", "secret").await.unwrap_err();
        assert_eq!(err.reason, "Login failed");
        assert!(!session.store().is_authenticated());
    }

    #[tokio::test]
    async fn test_sign_up_does_not_sign_in() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/auth/register")
            .match_body(Matcher::PartialJson(json!({ "fullName": "Bob Builder" })))
            .with_status(201)
            .with_body(sample_user_json("5").to_string())
            .create_async()
            .await;

        let (session, storage) = session_for(&server);
        let request = RegisterRequest {
            username: "bob".into(),
            email: "bob@example.com".into(),
            password: "secret".into(),
            full_name: "Bob Builder".into(),
        };
        session.sign_up(&request).await.unwrap();

        mock.assert_async().await;
        assert!(!session.store().is_authenticated());
        assert!(session.store().user().is_none());
        assert!(storage.is_empty());
        assert_eq!(session.status().phase, ActionPhase::Fulfilled);
    }

    #[tokio::test]
    async fn test_sign_up_conflict_reports_server_message() {
        let mut server = mockito::Server::new_async().await;
        let _register = server
            .mock("POST", "/auth/register")
            .with_status(409)
            .with_body(r#"{"message":"Username already exists"}"#)
            .create_async()
            .await;

        let (session, _) = session_for(&server);
        let request = RegisterRequest {
            username: "bob".into(),
            email: "bob@example.com".into(),
            password: "secret".into(),
            full_name: "Bob".into(),
        };
        let err = session.sign_up(&request).await.unwrap_err();
        assert_eq!(err.reason, "Username already exists");
        assert_eq!(err.to_string(), "Username already exists");
    }

    #[tokio::test]
    async fn test_sign_out_clears_even_when_server_fails() {
        let mut server = mockito::Server::new_async().await;
        let access = token_expiring_in(900);
        let mock = server
            .mock("POST", "/auth/logout")
            .match_header("authorization", format!("Bearer {}", access).as_str())
            .with_status(500)
            .create_async()
            .await;

        let (session, storage) = session_for(&server);
        session.store().set_credentials(CredentialUpdate {
            access_token: Some(access),
            refresh_token: Some("r1".into()),
            user: Some(sample_user("1")),
        });

        let err = session.sign_out().await.unwrap_err();
        mock.assert_async().await;
        assert_eq!(err.reason, "Logout failed");

        assert!(!session.store().is_authenticated());
        assert_eq!(session.store().snapshot(), Default::default());
        assert!(storage.is_empty());
        assert_eq!(session.status().phase, ActionPhase::Rejected("Logout failed".into()));
    }

    #[tokio::test]
    async fn test_sign_out_success() {
        let mut server = mockito::Server::new_async().await;
        let _logout = server
            .mock("POST", "/auth/logout")
            .with_status(200)
            .create_async()
            .await;

        let (session, storage) = session_for(&server);
        session
            .store()
            .set_credentials(CredentialUpdate::tokens(token_expiring_in(900), Some("r1".into())));

        session.sign_out().await.unwrap();
        assert!(storage.is_empty());
        assert_eq!(session.status().phase, ActionPhase::Fulfilled);

        // Already signed out: still clears and succeeds
        session.sign_out().await.unwrap();
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_and_update_profile_replace_user() {
        let mut server = mockito::Server::new_async().await;
        let _get = server
            .mock("GET", "/users/profile")
            .with_status(200)
            .with_body(sample_user_json("1").to_string())
            .create_async()
            .await;

        let mut updated = sample_user_json("1");
        updated["fullName"] = json!("Robert Builder");
        updated["email"] = json!("robert@example.com");
        let put = server
            .mock("PUT", "/users/profile")
            .match_body(Matcher::Json(json!({ "fullName": "Robert Builder", "email": "robert@example.com" })))
            .with_status(200)
            .with_body(updated.to_string())
            .create_async()
            .await;

        let (session, storage) = session_for(&server);
        let access = token_expiring_in(900);
        session
            .store()
            .set_credentials(CredentialUpdate::tokens(access.clone(), Some("r1".into())));

        let user = session.fetch_profile().await.unwrap();
        assert_eq!(session.store().user(), Some(user));

        let request = UpdateProfileRequest {
            full_name: Some("Robert Builder".into()),
            email: Some("robert@example.com".into()),
            avatar: None,
        };
        let user = session.update_profile(&request).await.unwrap();
        put.assert_async().await;

        assert_eq!(user.full_name, "Robert Builder");
        assert_eq!(session.store().user().unwrap().email, "robert@example.com");
        // Tokens untouched
        assert_eq!(session.store().access_token(), Some(access.clone()));
        assert_eq!(storage.get(StorageKey::AccessToken).unwrap(), Some(access));
    }

    #[tokio::test]
    async fn test_change_password_failure_keeps_session() {
        let mut server = mockito::Server::new_async().await;
        let _change = server
            .mock("POST", "/users/change-password")
            .with_status(400)
            .with_body(r#"{"message":"Current password is incorrect"}"#)
            .create_async()
            .await;

        let (session, _) = session_for(&server);
        session
            .store()
            .set_credentials(CredentialUpdate::tokens(token_expiring_in(900), Some("r1".into())));

        let err = session.change_password("wrong", "new-secret").await.unwrap_err();
        assert_eq!(err.reason, "Current password is incorrect");
        assert!(session.store().is_authenticated());
    }

    #[tokio::test]
    async fn test_forgot_password_fallback_reason() {
        let mut server = mockito::Server::new_async().await;
        let _forgot = server
            .mock("POST", "/auth/forgot-password")
            .with_status(503)
            .create_async()
            .await;

        let (session, _) = session_for(&server);
        let err = session.forgot_password("bob@example.com").await.unwrap_err();
        assert_eq!(err.reason, "Failed to request password reset");
    }

    #[test]
    fn test_status_helpers() {
        let mut status = ActionStatus::default();
        assert!(!status.is_loading());
        assert!(status.error().is_none());

        status.phase = ActionPhase::Pending;
        assert!(status.is_loading());

        status.phase = ActionPhase::Rejected("nope".into());
        assert_eq!(status.error(), Some("nope"));
    }

    /// Records each published status until the action settles.
    async fn phases_until_settled(
        rx: &mut watch::Receiver<ActionStatus>,
    ) -> Vec<ActionPhase> {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let phase = rx.borrow_and_update().phase.clone();
            let settled = matches!(phase, ActionPhase::Fulfilled | ActionPhase::Rejected(_));
            seen.push(phase);
            if settled {
                break;
            }
        }
        seen
    }

    #[tokio::test]
    async fn test_sign_in_is_pending_while_in_flight() {
        let mut server = mockito::Server::new_async().await;
        let _login = server
            .mock("POST", "/auth/login")
            .with_status(200)
            .with_body(
                json!({
                    "accessToken": token_expiring_in(900),
                    "refreshToken": "r1",
                    "user": sample_user_json("1"),
                })
                .to_string(),
            )
            .create_async()
            .await;

        let (session, _) = session_for(&server);
        let mut rx = session.subscribe();

        let (result, phases) =
            tokio::join!(session.sign_in("bob", "secret"), phases_until_settled(&mut rx));

        assert!(result.is_ok());
        assert_eq!(phases, vec![ActionPhase::Pending, ActionPhase::Fulfilled]);
        assert_eq!(session.status().action, Some(Action::SignIn));
        assert!(!session.status().is_loading());
    }

    #[tokio::test]
    async fn test_rejected_sign_in_goes_pending_then_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _login = server
            .mock("POST", "/auth/login")
            .with_status(401)
            .with_body(r#"{"message":"Invalid credentials"}"#)
            .create_async()
            .await;

        let (session, _) = session_for(&server);
        let mut rx = session.subscribe();

        let (result, phases) =
            tokio::join!(session.sign_in("bob", "wrong"), phases_until_settled(&mut rx));

        assert_eq!(result.unwrap_err().reason, "Invalid credentials");
        assert_eq!(
            phases,
            vec![
                ActionPhase::Pending,
                ActionPhase::Rejected("Invalid credentials".into())
            ]
        );
        assert_eq!(session.status().error(), Some("Invalid credentials"));
    }
}
