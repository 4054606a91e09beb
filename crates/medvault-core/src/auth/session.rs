//! Session controller.
//!
//! `Session` is the only writer of the current user. It moves between three
//! states:
//!
//! - `Unauthenticated`: no confirmed user
//! - `Validating`: a stored token is being checked with the backend (startup)
//! - `Authenticated`: token stored and user known
//!
//! Observers follow the state through [`Session::subscribe`].

use std::sync::Arc;

use reqwest::Method;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast::error::RecvError, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::error::error_text;
use crate::api::{ApiClient, ApiError, RequestOptions};
use crate::models::{LoginRequest, LoginResponse, Registration, User, ValidateResponse};

use super::{SessionEvent, SharedTokenStore, TokenStore};

const LOGIN_PATH: &str = "/api/auth/login";
const REGISTER_PATH: &str = "/api/auth/register";
const VALIDATE_PATH: &str = "/api/auth/validate";

const LOGIN_FAILED: &str = "Login failed";
const REGISTRATION_FAILED: &str = "Registration failed";

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Validating,
    Authenticated(User),
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    /// The backend answered and refused; the text is meant for the user.
    #[error("{0}")]
    Rejected(String),

    /// No usable answer (network failure, bad URL, ...).
    #[error(transparent)]
    Request(#[from] ApiError),
}

#[derive(Clone)]
pub struct Session {
    api: ApiClient,
    state: Arc<watch::Sender<SessionState>>,
}

impl Session {
    pub fn new(api: ApiClient) -> Self {
        let (state, _) = watch::channel(SessionState::Unauthenticated);
        Self {
            api,
            state: Arc::new(state),
        }
    }

    /// The API client sharing this session's token store.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user().cloned()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(*self.state.borrow(), SessionState::Authenticated(_))
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    fn tokens(&self) -> &SharedTokenStore {
        self.api.tokens()
    }

    fn transition(&self, next: SessionState) {
        debug!(state = state_name(&next), "Session state change");
        self.state.send_replace(next);
    }

    /// Establish the startup state from the stored token.
    ///
    /// Without a token the session is unauthenticated. With one, the backend
    /// is asked whether it still accepts it. A rejected token is cleared; a
    /// transport failure or server error leaves it in place, since the
    /// backend never said it was invalid.
    pub async fn start(&self) -> SessionState {
        if !self.tokens().is_present() {
            debug!("No stored token");
            self.transition(SessionState::Unauthenticated);
            return self.state();
        }

        self.transition(SessionState::Validating);
        let next = match self.api.request(VALIDATE_PATH, RequestOptions::new(Method::GET)).await {
            Ok(response) if response.is_success() => {
                let validated = response
                    .body
                    .and_then(|body| serde_json::from_value::<ValidateResponse>(body).ok());
                match validated {
                    Some(ValidateResponse {
                        valid: true,
                        user: Some(user),
                    }) => {
                        info!(user_id = user.id, "Stored session is valid");
                        SessionState::Authenticated(user)
                    }
                    _ => {
                        info!("Stored token rejected by validation");
                        self.tokens().clear();
                        SessionState::Unauthenticated
                    }
                }
            }
            Ok(response) if response.status.is_client_error() => {
                info!(status = %response.status, "Stored token rejected by validation");
                self.tokens().clear();
                SessionState::Unauthenticated
            }
            Ok(response) => {
                warn!(status = %response.status, "Token validation failed, keeping token");
                SessionState::Unauthenticated
            }
            Err(ApiError::Unauthorized { .. }) => {
                info!("Stored token expired");
                SessionState::Unauthenticated
            }
            Err(e) => {
                warn!(error = %e, "Token validation failed, keeping token");
                SessionState::Unauthenticated
            }
        };

        self.transition(next);
        self.state()
    }

    /// Log in. On success the token and the user are stored together.
    ///
    /// Expected failures (bad credentials, validation errors) come back as
    /// [`AuthError::Rejected`] carrying the server's message.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let options = RequestOptions::new(Method::POST).with_json(&LoginRequest { email, password })?;

        let response = match self.api.request(LOGIN_PATH, options).await {
            Ok(response) => response,
            Err(ApiError::Unauthorized { body }) => {
                let message = body.as_ref().and_then(error_text);
                info!("Login rejected");
                return Err(AuthError::Rejected(message.unwrap_or_else(|| LOGIN_FAILED.to_string())));
            }
            Err(e) => {
                warn!(error = %e, "Login request failed");
                return Err(e.into());
            }
        };

        let body = response.body.unwrap_or(Value::Null);
        if !response.status.is_success() {
            info!(status = %response.status, "Login rejected");
            return Err(AuthError::Rejected(
                error_text(&body).unwrap_or_else(|| LOGIN_FAILED.to_string()),
            ));
        }

        let LoginResponse { token, user } = match serde_json::from_value(body) {
            Ok(login) => login,
            Err(e) => {
                warn!(error = %e, "Malformed login response");
                return Err(AuthError::Rejected(LOGIN_FAILED.to_string()));
            }
        };

        self.tokens().set(&token);
        self.transition(SessionState::Authenticated(user.clone()));
        self.api.events().emit(SessionEvent::LoggedIn(user.clone()));
        info!(user_id = user.id, "Login successful");
        Ok(user)
    }

    /// Create an account. Does not log in; callers must call
    /// [`Session::login`] afterwards.
    pub async fn register(&self, registration: &Registration) -> Result<Option<Value>, AuthError> {
        let options = RequestOptions::new(Method::POST).with_json(registration)?;

        let response = match self.api.request(REGISTER_PATH, options).await {
            Ok(response) => response,
            Err(ApiError::Unauthorized { body }) => {
                let message = body.as_ref().and_then(error_text);
                return Err(AuthError::Rejected(
                    message.unwrap_or_else(|| REGISTRATION_FAILED.to_string()),
                ));
            }
            Err(e) => {
                warn!(error = %e, "Registration request failed");
                return Err(e.into());
            }
        };

        if response.status.is_success() {
            info!("Registration successful");
            Ok(response.body)
        } else {
            let message = response.body.as_ref().and_then(error_text);
            info!(status = %response.status, "Registration rejected");
            Err(AuthError::Rejected(
                message.unwrap_or_else(|| REGISTRATION_FAILED.to_string()),
            ))
        }
    }

    /// Forget the token and the user. Purely local.
    pub fn logout(&self) {
        self.tokens().clear();
        self.transition(SessionState::Unauthenticated);
        self.api.events().emit(SessionEvent::LoggedOut);
        info!("Logged out");
    }

    /// Apply a session event to the state. Only `Expired` has an effect, and
    /// only while no token is stored: a login that completed after the 401
    /// keeps its session.
    pub fn handle_event(&self, event: &SessionEvent) {
        if let SessionEvent::Expired = event {
            expire(&self.state, self.tokens());
        }
    }

    /// Follow the API client's events in the background, ending the session
    /// whenever a request is answered with 401.
    pub fn watch_expiry(&self) -> JoinHandle<()> {
        let mut rx = self.api.events().subscribe();
        let state = Arc::clone(&self.state);
        let tokens = Arc::clone(self.tokens());

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(SessionEvent::Expired) => expire(&state, &tokens),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Session events lagged");
                        // A missed Expired still shows as a cleared token
                        expire(&state, &tokens);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

fn expire(state: &watch::Sender<SessionState>, tokens: &SharedTokenStore) {
    if tokens.is_present() {
        debug!("Token present, ignoring stale expiry");
        return;
    }
    let changed = state.send_if_modified(|current| {
        if *current == SessionState::Unauthenticated {
            false
        } else {
            *current = SessionState::Unauthenticated;
            true
        }
    });
    if changed {
        info!("Session expired");
    }
}

fn state_name(state: &SessionState) -> &'static str {
    match state {
        SessionState::Unauthenticated => "unauthenticated",
        SessionState::Validating => "validating",
        SessionState::Authenticated(_) => "authenticated",
    }
}
