//! Session Manager flows against an in-memory platform.

use async_trait::async_trait;
use auth_session::{
    AuthBackend, AuthError, AuthEvent, AuthState, AuthView, Session, SessionManager, SIGNED_IN,
    SIGNED_OUT, SIGNED_UP,
};
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use session_store::{MemoryStorage, SecretsManager, SessionMeta, StoredSession};
use std::sync::Arc;
use supabase_platform::{AuthSession, AuthUser, PlatformError, PlatformResult};
use todo_config_and_utils::{Notice, NoticeReceiver, Notifier};

#[derive(Clone, Copy)]
enum Outcome {
    Ok,
    Reject(u16, &'static str),
    Unreachable,
}

impl Outcome {
    fn check(self) -> PlatformResult<()> {
        match self {
            Outcome::Ok => Ok(()),
            Outcome::Reject(status, message) => Err(PlatformError::Api {
                status,
                message: message.to_string(),
            }),
            Outcome::Unreachable => Err(PlatformError::Api {
                status: 503,
                message: "Service Unavailable".to_string(),
            }),
        }
    }
}

struct FakeAuth {
    calls: Mutex<Vec<String>>,
    sign_up: Mutex<Outcome>,
    sign_in: Mutex<Outcome>,
    refresh: Mutex<Outcome>,
    get_user: Mutex<Outcome>,
    sign_out: Mutex<Outcome>,
    issued: Mutex<u32>,
}

impl FakeAuth {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            sign_up: Mutex::new(Outcome::Ok),
            sign_in: Mutex::new(Outcome::Ok),
            refresh: Mutex::new(Outcome::Ok),
            get_user: Mutex::new(Outcome::Ok),
            sign_out: Mutex::new(Outcome::Ok),
            issued: Mutex::new(0),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }

    fn issue(&self, email: &str) -> AuthSession {
        let mut issued = self.issued.lock();
        *issued += 1;
        AuthSession {
            access_token: format!("at-{}", *issued),
            refresh_token: format!("rt-{}", *issued),
            expires_in: 3600,
            expires_at: None,
            user: AuthUser {
                id: "user-1".to_string(),
                email: Some(email.to_string()),
            },
        }
    }
}

#[async_trait]
impl AuthBackend for FakeAuth {
    async fn sign_up(&self, email: &str, _password: &str, redirect_to: &str) -> PlatformResult<AuthUser> {
        self.record(&format!("sign_up:{email}:{redirect_to}"));
        self.sign_up.lock().check()?;
        Ok(AuthUser {
            id: "user-1".to_string(),
            email: Some(email.to_string()),
        })
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PlatformResult<AuthSession> {
        self.record(&format!("sign_in:{email}:{password}"));
        self.sign_in.lock().check()?;
        Ok(self.issue(email))
    }

    async fn refresh_session(&self, refresh_token: &str) -> PlatformResult<AuthSession> {
        self.record(&format!("refresh:{refresh_token}"));
        self.refresh.lock().check()?;
        Ok(self.issue("a@example.com"))
    }

    async fn get_user(&self, access_token: &str) -> PlatformResult<AuthUser> {
        self.record(&format!("get_user:{access_token}"));
        self.get_user.lock().check()?;
        Ok(AuthUser {
            id: "user-1".to_string(),
            email: Some("a@example.com".to_string()),
        })
    }

    async fn sign_out(&self, access_token: &str) -> PlatformResult<()> {
        self.record(&format!("sign_out:{access_token}"));
        self.sign_out.lock().check()
    }
}

struct Harness {
    auth: Arc<FakeAuth>,
    storage: Arc<MemoryStorage>,
    manager: SessionManager,
    notices: NoticeReceiver,
    events: Arc<Mutex<Vec<AuthEvent>>>,
    _subscription: auth_session::AuthSubscription,
}

impl Harness {
    fn new() -> Self {
        Self::with_storage(Arc::new(MemoryStorage::new()))
    }

    fn with_storage(storage: Arc<MemoryStorage>) -> Self {
        let auth = FakeAuth::new();
        let (notifier, notices) = Notifier::channel();
        let manager = SessionManager::new(
            auth.clone(),
            SecretsManager::new(Box::new(storage.clone())),
            "http://localhost:5173",
            notifier,
        );

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let subscription = manager.on_auth_state_change(move |event| sink.lock().push(event.clone()));

        Self {
            auth,
            storage,
            manager,
            notices,
            events,
            _subscription: subscription,
        }
    }

    fn secrets(&self) -> SecretsManager {
        SecretsManager::new(Box::new(self.storage.clone()))
    }

    fn drain_notices(&mut self) -> Vec<Notice> {
        let mut out = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            out.push(notice);
        }
        out
    }

    fn events(&self) -> Vec<AuthEvent> {
        self.events.lock().clone()
    }

    async fn signed_in(mut self) -> Self {
        self.manager.restore().await.unwrap();
        self.manager.sign_in("a@example.com", "pw").await.unwrap();
        self.drain_notices();
        self.events.lock().clear();
        self.auth.calls.lock().clear();
        self
    }
}

fn seed(storage: &Arc<MemoryStorage>, expires_in: Duration) {
    SecretsManager::new(Box::new(storage.clone()))
        .store_session(&StoredSession {
            access_token: "stored-at".to_string(),
            refresh_token: "stored-rt".to_string(),
            meta: SessionMeta {
                user_id: "user-1".to_string(),
                email: Some("a@example.com".to_string()),
                expires_at: Utc::now() + expires_in,
            },
        })
        .unwrap();
}

fn user() -> Session {
    Session {
        user_id: "user-1".to_string(),
        email: Some("a@example.com".to_string()),
    }
}

#[tokio::test]
async fn blank_credentials_make_no_request() {
    let mut h = Harness::new();
    h.manager.restore().await.unwrap();

    for (email, password) in [("", "pw"), ("a@example.com", "   "), (" \t", "\n")] {
        assert!(matches!(
            h.manager.sign_in(email, password).await,
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            h.manager.sign_up(email, password).await,
            Err(AuthError::MissingCredentials)
        ));
    }

    assert!(h.auth.calls().is_empty());
    let notices = h.drain_notices();
    assert_eq!(notices.len(), 6);
    assert!(notices
        .iter()
        .all(|n| n.is_error() && n.message == "Please enter both email and password"));
    assert_eq!(h.manager.state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn email_is_trimmed_but_password_is_sent_as_typed() {
    let h = Harness::new();
    h.manager.restore().await.unwrap();

    h.manager.sign_in("  a@example.com ", " pw ").await.unwrap();
    assert_eq!(h.auth.calls(), vec!["sign_in:a@example.com: pw ".to_string()]);
}

#[tokio::test]
async fn sign_up_notifies_and_stays_signed_out() {
    let mut h = Harness::new();
    h.manager.restore().await.unwrap();

    h.manager.sign_up("new@example.com", "pw").await.unwrap();

    assert_eq!(
        h.auth.calls(),
        vec!["sign_up:new@example.com:http://localhost:5173".to_string()]
    );
    assert_eq!(h.drain_notices(), vec![Notice::success(SIGNED_UP)]);
    assert_eq!(h.manager.state(), AuthState::Unauthenticated);
    assert!(h.manager.session().is_none());
    assert!(!h.secrets().has_session().unwrap());
}

#[tokio::test]
async fn sign_up_failure_surfaces_platform_message() {
    let mut h = Harness::new();
    h.manager.restore().await.unwrap();
    *h.auth.sign_up.lock() = Outcome::Reject(422, "User already registered");

    assert!(h.manager.sign_up("a@example.com", "pw").await.is_err());
    assert_eq!(
        h.drain_notices(),
        vec![Notice::error("User already registered")]
    );
    assert_eq!(h.manager.state(), AuthState::Unauthenticated);
}

#[tokio::test]
async fn sign_in_persists_and_announces() {
    let mut h = Harness::new();
    h.manager.restore().await.unwrap();

    let session = h.manager.sign_in("a@example.com", "pw").await.unwrap();
    assert_eq!(session, user());

    assert_eq!(h.manager.state(), AuthState::Authenticated);
    assert_eq!(h.manager.state().view(), AuthView::Authenticated);
    assert_eq!(h.manager.session(), Some(user()));
    assert_eq!(
        h.secrets().access_token().unwrap(),
        Some("at-1".to_string())
    );
    assert_eq!(
        h.events(),
        vec![AuthEvent::InitialSession(None), AuthEvent::SignedIn(user())]
    );
    assert_eq!(h.drain_notices(), vec![Notice::success(SIGNED_IN)]);
}

#[tokio::test]
async fn sign_in_while_signed_in_is_rejected() {
    let h = Harness::new().signed_in().await;
    assert!(matches!(
        h.manager.sign_in("a@example.com", "pw").await,
        Err(AuthError::InvalidStateTransition(_))
    ));
    assert!(h.auth.calls().is_empty());
}

#[tokio::test]
async fn sign_out_clears_everything() {
    let mut h = Harness::new().signed_in().await;

    h.manager.sign_out().await.unwrap();

    assert_eq!(h.auth.calls(), vec!["sign_out:at-1".to_string()]);
    assert_eq!(h.manager.state(), AuthState::Unauthenticated);
    assert!(h.manager.session().is_none());
    assert!(!h.secrets().has_session().unwrap());
    assert_eq!(h.events(), vec![AuthEvent::SignedOut]);
    assert_eq!(h.drain_notices(), vec![Notice::success(SIGNED_OUT)]);
}

#[tokio::test]
async fn sign_out_failure_keeps_session() {
    let mut h = Harness::new().signed_in().await;
    *h.auth.sign_out.lock() = Outcome::Reject(500, "Database error");

    assert!(h.manager.sign_out().await.is_err());

    assert_eq!(h.manager.state(), AuthState::Authenticated);
    assert_eq!(h.manager.session(), Some(user()));
    assert!(h.secrets().has_session().unwrap());
    assert!(h.events().is_empty());
    assert_eq!(h.drain_notices(), vec![Notice::error("Database error")]);
}

#[tokio::test]
async fn restore_verifies_unexpired_session() {
    let storage = Arc::new(MemoryStorage::new());
    seed(&storage, Duration::hours(1));
    let h = Harness::with_storage(storage);

    let restored = h.manager.restore().await.unwrap();

    assert_eq!(restored, Some(user()));
    assert_eq!(h.auth.calls(), vec!["get_user:stored-at".to_string()]);
    assert_eq!(h.manager.state(), AuthState::Authenticated);
    assert_eq!(h.events(), vec![AuthEvent::InitialSession(Some(user()))]);
}

#[tokio::test]
async fn restore_clears_rejected_session() {
    let storage = Arc::new(MemoryStorage::new());
    seed(&storage, Duration::hours(1));
    let h = Harness::with_storage(storage);
    *h.auth.get_user.lock() = Outcome::Reject(401, "invalid JWT");

    assert_eq!(h.manager.restore().await.unwrap(), None);
    assert_eq!(h.manager.state(), AuthState::Unauthenticated);
    assert!(!h.secrets().has_session().unwrap());
    assert_eq!(h.events(), vec![AuthEvent::InitialSession(None)]);
}

#[tokio::test]
async fn restore_keeps_session_when_platform_unreachable() {
    let storage = Arc::new(MemoryStorage::new());
    seed(&storage, Duration::hours(1));
    let h = Harness::with_storage(storage);
    *h.auth.get_user.lock() = Outcome::Unreachable;

    assert_eq!(h.manager.restore().await.unwrap(), None);
    assert_eq!(h.manager.state(), AuthState::Unauthenticated);
    assert!(h.secrets().has_session().unwrap());
}

#[tokio::test]
async fn restore_refreshes_expired_session_once() {
    let storage = Arc::new(MemoryStorage::new());
    seed(&storage, Duration::minutes(-5));
    let h = Harness::with_storage(storage);

    let restored = h.manager.restore().await.unwrap();

    assert_eq!(restored, Some(user()));
    assert_eq!(h.auth.calls(), vec!["refresh:stored-rt".to_string()]);
    assert_eq!(h.manager.state(), AuthState::Authenticated);
    assert_eq!(
        h.events(),
        vec![
            AuthEvent::TokenRefreshed(user()),
            AuthEvent::InitialSession(Some(user())),
        ]
    );
    assert_eq!(
        h.secrets().access_token().unwrap(),
        Some("at-1".to_string())
    );
}

#[tokio::test]
async fn restore_refresh_failure_clears_without_retry() {
    let storage = Arc::new(MemoryStorage::new());
    seed(&storage, Duration::minutes(-5));
    let h = Harness::with_storage(storage);
    *h.auth.refresh.lock() = Outcome::Unreachable;

    assert_eq!(h.manager.restore().await.unwrap(), None);
    assert_eq!(h.auth.calls().len(), 1);
    assert_eq!(h.manager.state(), AuthState::Unauthenticated);
    assert!(!h.secrets().has_session().unwrap());
    assert_eq!(h.events(), vec![AuthEvent::InitialSession(None)]);
}

#[tokio::test]
async fn access_token_refreshes_when_expired() {
    let h = Harness::new().signed_in().await;
    assert_eq!(h.manager.access_token().await.unwrap(), "at-1");
    assert!(h.auth.calls().is_empty());

    seed(&h.storage, Duration::seconds(-1));
    assert_eq!(h.manager.access_token().await.unwrap(), "at-2");
    assert_eq!(h.auth.calls(), vec!["refresh:stored-rt".to_string()]);
    assert_eq!(h.events(), vec![AuthEvent::TokenRefreshed(user())]);
    assert_eq!(h.manager.state(), AuthState::Authenticated);
}

#[tokio::test]
async fn failed_refresh_signs_out() {
    let h = Harness::new().signed_in().await;
    seed(&h.storage, Duration::seconds(-1));
    *h.auth.refresh.lock() = Outcome::Reject(400, "Invalid Refresh Token");

    assert!(matches!(
        h.manager.access_token().await,
        Err(AuthError::SessionExpired)
    ));
    assert_eq!(h.manager.state(), AuthState::Unauthenticated);
    assert!(h.manager.session().is_none());
    assert_eq!(h.events(), vec![AuthEvent::SignedOut]);
}

#[tokio::test]
async fn dropped_subscription_stops_events() {
    let h = Harness::new();
    let seen = Arc::new(Mutex::new(0usize));
    let counter = seen.clone();
    let sub = h.manager.on_auth_state_change(move |_| *counter.lock() += 1);
    assert_eq!(h.manager.listener_count(), 2);

    h.manager.restore().await.unwrap();
    assert_eq!(*seen.lock(), 1);

    sub.unsubscribe();
    assert_eq!(h.manager.listener_count(), 1);
    h.manager.sign_in("a@example.com", "pw").await.unwrap();
    assert_eq!(*seen.lock(), 1);
}
