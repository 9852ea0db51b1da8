//! Authentication state machine.
//!
//! State transitions are expressed as a pure reducer over explicit events,
//! with `AuthController` driving the reducer from the provider client and
//! session store.

use tracing::{debug, warn};

use super::client::AuthClient;
use super::error::AuthError;
use super::session::{CredentialSet, SessionStore};

/// Lifecycle phase of the most recent auth operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthStatus {
    #[default]
    Idle,
    Loading,
    Succeeded,
    Failed,
}

/// Snapshot of the authentication state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub status: AuthStatus,
    pub is_authenticated: bool,
    pub username: Option<String>,
    pub error: Option<String>,
}

/// Events that drive state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    LoginStarted,
    LoginSucceeded { username: String },
    LoginFailed { message: String },
    RestoreStarted,
    RestoreSucceeded { username: String },
    RestoreFailed,
    LoggedOut,
}

/// Applies one event to a state, producing the next state.
///
/// Pure: no I/O, no clock, no provider calls.
pub fn reduce(state: &AuthState, event: &AuthEvent) -> AuthState {
    match event {
        AuthEvent::LoginStarted | AuthEvent::RestoreStarted => AuthState {
            status: AuthStatus::Loading,
            error: None,
            ..state.clone()
        },
        AuthEvent::LoginSucceeded { username } | AuthEvent::RestoreSucceeded { username } => {
            AuthState {
                status: AuthStatus::Succeeded,
                is_authenticated: true,
                username: Some(username.clone()),
                error: None,
            }
        }
        AuthEvent::LoginFailed { message } => AuthState {
            status: AuthStatus::Failed,
            is_authenticated: false,
            username: None,
            error: Some(message.clone()),
        },
        // A failed restore is the normal signed-out case, not an error.
        AuthEvent::RestoreFailed => AuthState {
            status: AuthStatus::Idle,
            is_authenticated: false,
            username: None,
            error: None,
        },
        AuthEvent::LoggedOut => AuthState::default(),
    }
}

/// Drives the auth lifecycle against the provider client and session store.
pub struct AuthController {
    state: AuthState,
    client: AuthClient,
    store: SessionStore,
}

impl AuthController {
    pub fn new(client: AuthClient, store: SessionStore) -> Self {
        Self {
            state: AuthState::default(),
            client,
            store,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn client(&self) -> &AuthClient {
        &self.client
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    fn apply(&mut self, event: &AuthEvent) {
        self.state = reduce(&self.state, event);
    }

    /// Password login: authenticate, persist the session, update state.
    pub async fn login(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<CredentialSet, AuthError> {
        self.apply(&AuthEvent::LoginStarted);

        let result: Result<CredentialSet, AuthError> = async {
            let creds = self.client.authenticate(username, password).await?;
            self.store.persist(&creds)?;
            Ok(creds)
        }
        .await;

        match &result {
            Ok(creds) => {
                debug!(username = %creds.username, "login succeeded");
                self.apply(&AuthEvent::LoginSucceeded {
                    username: creds.username.clone(),
                });
            }
            Err(e) => {
                warn!("login failed: {e}");
                self.apply(&AuthEvent::LoginFailed {
                    message: e.to_string(),
                });
            }
        }
        result
    }

    /// Restores a persisted session if one exists and is still valid.
    pub fn restore_session(&mut self) -> Option<CredentialSet> {
        self.apply(&AuthEvent::RestoreStarted);

        match self.store.current_session() {
            Some(creds) => {
                self.apply(&AuthEvent::RestoreSucceeded {
                    username: creds.username.clone(),
                });
                Some(creds)
            }
            None => {
                self.apply(&AuthEvent::RestoreFailed);
                None
            }
        }
    }

    /// Clears the persisted session and resets state.
    ///
    /// Returns whether credentials were actually removed. State is reset
    /// even if the store write fails.
    pub fn logout(&mut self) -> Result<bool, AuthError> {
        let cleared = self.store.clear();
        self.apply(&AuthEvent::LoggedOut);
        Ok(cleared?)
    }
}


#[cfg(test)]
mod controller_tests {
    use serde_json::json;
    use tempfile::tempdir;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::super::jwt::testutil::make_jwt;
    use super::*;

    fn controller_for(server: &MockServer, session_path: std::path::PathBuf) -> AuthController {
        let client = AuthClient::new(
            "client-1",
            &server.uri(),
            &server.uri(),
            "http://localhost:3000/callback",
        );
        AuthController::new(client, SessionStore::with_path(session_path, "client-1"))
    }

    /// Login persists the session and a fresh controller can restore it.
    #[tokio::test]
    async fn test_login_then_restore() {
        let server = MockServer::start().await;
        let id_token = make_jwt(&json!({
            "cognito:username": "alice",
            "exp": 4_102_444_800_i64,
        }));
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "AuthenticationResult": {
                    "IdToken": id_token,
                    "AccessToken": "access-1",
                    "RefreshToken": "refresh-1",
                }
            })))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let session_path = dir.path().join("session.json");

        let mut controller = controller_for(&server, session_path.clone());
        controller.login("alice@example.com", "Abcdef1!").await.unwrap();
        assert!(controller.state().is_authenticated);
        assert_eq!(controller.state().username.as_deref(), Some("alice"));

        let mut fresh = controller_for(&server, session_path);
        let restored = fresh.restore_session().unwrap();
        assert_eq!(restored.username, "alice");
        assert!(fresh.state().is_authenticated);
    }

    /// Invalid credentials leave the controller failed and nothing persisted.
    #[tokio::test]
    async fn test_login_failure_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "__type": "NotAuthorizedException",
                "message": "Incorrect username or password.",
            })))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let mut controller = controller_for(&server, dir.path().join("session.json"));

        let err = controller.login("alice@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
        assert_eq!(controller.state().status, AuthStatus::Failed);
        assert!(controller.restore_session().is_none());
    }

    /// A persist failure after a successful provider call surfaces as a
    /// store error and lands the controller in Failed.
    #[tokio::test]
    async fn test_login_persist_failure() {
        let server = MockServer::start().await;
        let id_token = make_jwt(&json!({
            "cognito:username": "alice",
            "exp": 4_102_444_800_i64,
        }));
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "AuthenticationResult": {
                    "IdToken": id_token,
                    "AccessToken": "access-1",
                    "RefreshToken": "refresh-1",
                }
            })))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        // A regular file where the session directory should be makes the
        // store write fail.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let mut controller = controller_for(&server, blocker.join("session.json"));
        let err = controller.login("alice@example.com", "Abcdef1!").await.unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));
        assert_eq!(controller.state().status, AuthStatus::Failed);
    }

    /// Logout clears the persisted session and resets state.
    #[tokio::test]
    async fn test_logout_clears_session() {
        let server = MockServer::start().await;
        let id_token = make_jwt(&json!({
            "cognito:username": "alice",
            "exp": 4_102_444_800_i64,
        }));
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "AuthenticationResult": {
                    "IdToken": id_token,
                    "AccessToken": "access-1",
                    "RefreshToken": "refresh-1",
                }
            })))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let session_path = dir.path().join("session.json");
        let mut controller = controller_for(&server, session_path.clone());

        controller.login("alice@example.com", "Abcdef1!").await.unwrap();
        assert!(controller.logout().unwrap());
        assert_eq!(controller.state(), &AuthState::default());

        let mut fresh = controller_for(&server, session_path);
        assert!(fresh.restore_session().is_none());
    }
}
