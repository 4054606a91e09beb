//! Integration tests for the session lifecycle.

use std::sync::Arc;
use std::time::Duration;

use medvault_core::auth::{
    AuthError, FileTokenStore, MemoryTokenStore, SessionEvent, SessionEvents, SessionState,
    TokenStore,
};
use medvault_core::{ApiClient, Registration, Role, Session, User};
use serde_json::json;
use tempfile::TempDir;
use tokio::time::timeout;
use wiremock::matchers::{any, body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session(server: &MockServer, tokens: Arc<dyn TokenStore>) -> Session {
    let api = ApiClient::new(server.uri(), tokens, SessionEvents::new()).unwrap();
    Session::new(api)
}

#[tokio::test]
async fn test_login_success_stores_token_and_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"email": "a@b.com", "password": "x"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t1", "user": {"id": 1}})))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = Arc::new(MemoryTokenStore::new());
    let session = session(&server, tokens.clone());
    let mut events = session.api().events().subscribe();

    let user = session.login("a@b.com", "x").await.unwrap();

    assert_eq!(user, User::new(1));
    assert_eq!(tokens.get().as_deref(), Some("t1"));
    assert_eq!(session.state(), SessionState::Authenticated(User::new(1)));
    assert_eq!(session.current_user(), Some(User::new(1)));
    assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedIn(User::new(1)));
}

#[tokio::test]
async fn test_login_unauthorized_reports_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "bad credentials"})))
        .mount(&server)
        .await;

    let tokens = Arc::new(MemoryTokenStore::new());
    let session = session(&server, tokens.clone());

    let err = session.login("a@b.com", "wrong").await.unwrap_err();

    assert!(matches!(err, AuthError::Rejected(ref m) if m == "bad credentials"));
    assert_eq!(tokens.get(), None);
    assert_eq!(session.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_login_plain_text_rejection() {
    // The backend answers bad passwords with a 400 and a bare string
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Invalid password"))
        .mount(&server)
        .await;

    let session = session(&server, Arc::new(MemoryTokenStore::new()));
    let err = session.login("a@b.com", "wrong").await.unwrap_err();
    assert_eq!(err.to_string(), "Invalid password");
    assert!(!session.is_authenticated());
}

#[tokio::test]
async fn test_login_without_token_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"user": {"id": 1}})))
        .mount(&server)
        .await;

    let tokens = Arc::new(MemoryTokenStore::new());
    let session = session(&server, tokens.clone());
    let err = session.login("a@b.com", "x").await.unwrap_err();
    assert_eq!(err.to_string(), "Login failed");
    assert!(!tokens.is_present());
}

#[tokio::test]
async fn test_login_network_failure() {
    let api = ApiClient::new(
        "http://127.0.0.1:1",
        Arc::new(MemoryTokenStore::new()),
        SessionEvents::new(),
    )
    .unwrap();
    let session = Session::new(api);

    let err = session.login("a@b.com", "x").await.unwrap_err();
    assert!(matches!(err, AuthError::Request(_)));
    assert_eq!(session.state(), SessionState::Unauthenticated);
}

#[tokio::test]
async fn test_startup_with_valid_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/validate"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "valid": true,
            "user": {"id": 3, "email": "p@x.org", "role": "PATIENT"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server, Arc::new(MemoryTokenStore::with_token("t1")));
    let mut states = session.subscribe();

    let state = session.start().await;

    let user = state.user().cloned().unwrap();
    assert_eq!(user.id, 3);
    assert_eq!(user.role, Some(Role::Patient));
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), state);
}

#[tokio::test]
async fn test_startup_passes_through_validating() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/validate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"valid": true, "user": {"id": 2}}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let session = session(&server, Arc::new(MemoryTokenStore::with_token("t1")));
    let mut states = session.subscribe();
    let startup = tokio::spawn({
        let session = session.clone();
        async move { session.start().await }
    });

    timeout(Duration::from_secs(5), states.changed()).await.unwrap().unwrap();
    assert_eq!(*states.borrow_and_update(), SessionState::Validating);
    assert!(session.current_user().is_none());

    timeout(Duration::from_secs(5), states.changed()).await.unwrap().unwrap();
    assert_eq!(*states.borrow_and_update(), SessionState::Authenticated(User::new(2)));
    assert_eq!(startup.await.unwrap(), SessionState::Authenticated(User::new(2)));
}

#[tokio::test]
async fn test_startup_without_token_skips_validation() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true, "user": {"id": 2}})))
        .expect(0)
        .mount(&server)
        .await;

    let session = session(&server, Arc::new(MemoryTokenStore::new()));
    let mut states = session.subscribe();

    assert_eq!(session.start().await, SessionState::Unauthenticated);
    assert_eq!(*states.borrow_and_update(), SessionState::Unauthenticated);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_startup_with_rejected_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/validate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": false})))
        .mount(&server)
        .await;

    let tokens = Arc::new(MemoryTokenStore::with_token("old"));
    let session = session(&server, tokens.clone());

    assert_eq!(session.start().await, SessionState::Unauthenticated);
    assert_eq!(session.current_user(), None);
    assert!(!tokens.is_present());
}

#[tokio::test]
async fn test_startup_with_expired_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/validate"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"valid": false})))
        .mount(&server)
        .await;

    let tokens = Arc::new(MemoryTokenStore::with_token("old"));
    let session = session(&server, tokens.clone());
    let mut events = session.api().events().subscribe();

    assert_eq!(session.start().await, SessionState::Unauthenticated);
    assert!(!tokens.is_present());
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
}

#[tokio::test]
async fn test_startup_server_error_keeps_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/validate"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let tokens = Arc::new(MemoryTokenStore::with_token("t1"));
    let session = session(&server, tokens.clone());

    assert_eq!(session.start().await, SessionState::Unauthenticated);
    assert_eq!(tokens.get().as_deref(), Some("t1"));
}

#[tokio::test]
async fn test_startup_reads_persisted_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/auth/validate"))
        .and(header("authorization", "Bearer from-disk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true, "user": {"id": 8}})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    FileTokenStore::open(dir.path()).set("from-disk");

    let session = session(&server, Arc::new(FileTokenStore::open(dir.path())));
    assert_eq!(session.start().await, SessionState::Authenticated(User::new(8)));
}

#[tokio::test]
async fn test_logout_is_local() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t1", "user": {"id": 1}})))
        .mount(&server)
        .await;

    let tokens = Arc::new(MemoryTokenStore::new());
    let session = session(&server, tokens.clone());
    session.login("a@b.com", "x").await.unwrap();
    assert!(session.is_authenticated());

    session.logout();

    assert_eq!(tokens.get(), None);
    assert_eq!(session.current_user(), None);
    assert_eq!(session.state(), SessionState::Unauthenticated);
    // Only the login call reached the server
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_register_does_not_start_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .and(body_json(json!({
            "email": "new@clinic.org",
            "password": "pw",
            "name": "New Patient",
            "role": "patient",
            "bloodGroup": "O+"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5, "email": "new@clinic.org"})))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = Arc::new(MemoryTokenStore::new());
    let session = session(&server, tokens.clone());

    let mut registration = Registration::new("new@clinic.org", "pw", "New Patient", Role::Patient);
    registration.blood_group = Some("O+".to_string());
    let created = session.register(&registration).await.unwrap();

    assert_eq!(created.unwrap()["id"], 5);
    assert_eq!(session.state(), SessionState::Unauthenticated);
    assert!(!tokens.is_present());
}

#[tokio::test]
async fn test_register_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/register"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Email already exists"))
        .mount(&server)
        .await;

    let session = session(&server, Arc::new(MemoryTokenStore::new()));
    let registration = Registration::new("dup@clinic.org", "pw", "Dup", Role::Doctor);
    let err = session.register(&registration).await.unwrap_err();
    assert_eq!(err.to_string(), "Email already exists");
}

#[tokio::test]
async fn test_expiry_during_use_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "t1", "user": {"id": 1}})))
        .mount(&server)
        .await;
    Mock::given(any())
        .and(path("/api/prescriptions/patient"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let session = session(&server, Arc::new(MemoryTokenStore::new()));
    let mut states = session.subscribe();
    let watcher = session.watch_expiry();

    session.login("a@b.com", "x").await.unwrap();
    states.borrow_and_update();

    assert!(session.api().patient_prescriptions().await.is_err());

    states.changed().await.unwrap();
    assert_eq!(*states.borrow(), SessionState::Unauthenticated);
    assert!(!session.api().tokens().is_present());
    watcher.abort();
}
