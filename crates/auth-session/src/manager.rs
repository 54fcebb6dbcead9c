//! Session manager with FSM-based state tracking.
//!
//! The FSM holds the transient states (signing in, refreshing, signing out);
//! the tokens themselves live in the session store so a later run can pick
//! them up. Every identity change is pushed to `on_auth_state_change`
//! subscribers and summarized as a notice.

use crate::auth_fsm::{AuthMachine, AuthMachineInput, AuthState};
use crate::backend::AuthBackend;
use crate::events::{AuthCallback, AuthEvent, AuthSubscription, Listeners};
use crate::{AuthError, AuthResult};
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use session_store::{SecretsManager, SessionMeta, StoredSession};
use std::sync::Arc;
use supabase_platform::AuthSession;
use todo_config_and_utils::Notifier;
use tracing::{debug, info, warn};

pub const MISSING_CREDENTIALS: &str = "Please enter both email and password";
pub const SIGNED_UP: &str = "Signed up successfully! You can now sign in.";
pub const SIGNED_IN: &str = "Signed in successfully!";
pub const SIGNED_OUT: &str = "Signed out successfully!";

/// The authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl Session {
    fn from_meta(meta: &SessionMeta) -> Self {
        Self {
            user_id: meta.user_id.clone(),
            email: meta.email.clone(),
        }
    }
}

pub struct SessionManager {
    backend: Arc<dyn AuthBackend>,
    secrets: SecretsManager,
    email_redirect_to: String,
    notifier: Notifier,
    fsm: Mutex<AuthMachine>,
    session: RwLock<Option<Session>>,
    listeners: Arc<Listeners>,
    // One refresh in flight at a time.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl SessionManager {
    pub fn new(
        backend: Arc<dyn AuthBackend>,
        secrets: SecretsManager,
        email_redirect_to: impl Into<String>,
        notifier: Notifier,
    ) -> Self {
        Self {
            backend,
            secrets,
            email_redirect_to: email_redirect_to.into(),
            notifier,
            fsm: Mutex::new(AuthMachine::new()),
            session: RwLock::new(None),
            listeners: Arc::new(Listeners::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn state(&self) -> AuthState {
        AuthState::from(self.fsm.lock().state())
    }

    /// Current identity, `None` unless authenticated.
    pub fn session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.session.read().as_ref().map(|s| s.user_id.clone())
    }

    /// Register a callback for every auth event.
    pub fn on_auth_state_change<F>(&self, callback: F) -> AuthSubscription
    where
        F: Fn(&AuthEvent) + Send + Sync + 'static,
    {
        let callback: AuthCallback = Arc::new(callback);
        self.listeners.add(callback)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn transition(&self, input: AuthMachineInput) -> AuthResult<AuthState> {
        let mut fsm = self.fsm.lock();
        let old_state = AuthState::from(fsm.state());

        fsm.consume(&input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input, old_state
            ))
        })?;

        let new_state = AuthState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(old_state = ?old_state, new_state = ?new_state, "Auth state transition");
        }
        Ok(new_state)
    }

    fn set_session(&self, session: Option<Session>) {
        *self.session.write() = session;
    }

    fn persist(&self, auth: &AuthSession) -> AuthResult<Session> {
        let expires_at = auth
            .expires_at
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(auth.expires_in));

        let stored = StoredSession {
            access_token: auth.access_token.clone(),
            refresh_token: auth.refresh_token.clone(),
            meta: SessionMeta {
                user_id: auth.user.id.clone(),
                email: auth.user.email.clone(),
                expires_at,
            },
        };
        self.secrets.store_session(&stored)?;
        Ok(Session::from_meta(&stored.meta))
    }

    fn forget(&self) {
        if let Err(e) = self.secrets.clear_session() {
            warn!(error = %e, "Failed to clear stored session");
        }
        self.set_session(None);
    }

    /// Restore a persisted session at startup.
    ///
    /// - nothing stored: `Unauthenticated`
    /// - stored and unexpired: verified with `/auth/v1/user`; rejection clears it
    /// - stored and expired: one refresh attempt; failure clears it
    ///
    /// A transport failure during verification leaves the stored session in
    /// place for the next run but starts this one unauthenticated.
    ///
    /// Always emits exactly one `InitialSession` event.
    pub async fn restore(&self) -> AuthResult<Option<Session>> {
        let stored = match self.secrets.load_session() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Stored session unreadable, discarding");
                self.forget();
                None
            }
        };

        let Some(stored) = stored else {
            info!("No existing session found on startup");
            self.transition(AuthMachineInput::NoSession)?;
            return Ok(self.finish_restore(None));
        };

        if stored.is_expired() {
            info!(user_id = %stored.meta.user_id, "Session expired on startup, attempting refresh");
            self.transition(AuthMachineInput::SessionExpired)?;
            let session = self.refresh_with(&stored.refresh_token, false).await.ok();
            return Ok(self.finish_restore(session));
        }

        debug!(user_id = %stored.meta.user_id, "Verifying stored session with server");
        match self.backend.get_user(&stored.access_token).await {
            Ok(user) => {
                let mut session = Session::from_meta(&stored.meta);
                if user.email.is_some() {
                    session.email = user.email;
                }
                self.set_session(Some(session.clone()));
                self.transition(AuthMachineInput::SessionRestored)?;
                info!(user_id = %session.user_id, "Session restored");
                Ok(self.finish_restore(Some(session)))
            }
            Err(e) if e.is_transient() => {
                warn!(error = %e, "Could not reach platform to verify session, keeping it for later");
                self.transition(AuthMachineInput::NoSession)?;
                Ok(self.finish_restore(None))
            }
            Err(e) => {
                warn!(error = %e, "Stored session rejected, clearing");
                self.forget();
                self.transition(AuthMachineInput::NoSession)?;
                Ok(self.finish_restore(None))
            }
        }
    }

    fn finish_restore(&self, session: Option<Session>) -> Option<Session> {
        self.listeners
            .dispatch(&AuthEvent::InitialSession(session.clone()));
        session
    }

    /// Trimmed credentials, or a notice and an error when either is blank.
    fn credentials<'a>(&self, email: &'a str, password: &'a str) -> AuthResult<(&'a str, &'a str)> {
        // The password is sent as typed; only blankness is checked.
        let email = email.trim();
        if email.is_empty() || password.trim().is_empty() {
            self.notifier.error(MISSING_CREDENTIALS);
            return Err(AuthError::MissingCredentials);
        }
        Ok((email, password))
    }

    /// Create an account. Never signs in.
    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<()> {
        let (email, password) = self.credentials(email, password)?;
        self.transition(AuthMachineInput::SignUpAttempt)?;

        match self
            .backend
            .sign_up(email, password, &self.email_redirect_to)
            .await
        {
            Ok(user) => {
                self.transition(AuthMachineInput::SignUpComplete)?;
                info!(user_id = %user.id, "Sign-up accepted");
                self.notifier.success(SIGNED_UP);
                Ok(())
            }
            Err(e) => {
                self.transition(AuthMachineInput::SignUpFailed)?;
                self.notifier.error(e.to_string());
                Err(e.into())
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        let (email, password) = self.credentials(email, password)?;
        self.transition(AuthMachineInput::SignInAttempt)?;

        let auth = match self.backend.sign_in_with_password(email, password).await {
            Ok(auth) => auth,
            Err(e) => {
                self.transition(AuthMachineInput::SignInFailed)?;
                self.notifier.error(e.to_string());
                return Err(e.into());
            }
        };

        let session = match self.persist(&auth) {
            Ok(session) => session,
            Err(e) => {
                self.transition(AuthMachineInput::SignInFailed)?;
                self.notifier.error(e.to_string());
                return Err(e);
            }
        };

        self.set_session(Some(session.clone()));
        self.transition(AuthMachineInput::SignInSuccess)?;
        info!(user_id = %session.user_id, "Sign-in successful");

        self.listeners.dispatch(&AuthEvent::SignedIn(session.clone()));
        self.notifier.success(SIGNED_IN);
        Ok(session)
    }

    /// Revoke the session on the platform, then forget it locally.
    ///
    /// A refusal from the platform leaves the session in place.
    pub async fn sign_out(&self) -> AuthResult<()> {
        let access_token = self.secrets.access_token()?.ok_or(AuthError::NotSignedIn)?;
        self.transition(AuthMachineInput::SignOutRequested)?;

        if let Err(e) = self.backend.sign_out(&access_token).await {
            self.transition(AuthMachineInput::SignOutFailed)?;
            self.notifier.error(e.to_string());
            return Err(e.into());
        }

        self.forget();
        self.transition(AuthMachineInput::SignOutComplete)?;
        info!("Signed out");

        self.listeners.dispatch(&AuthEvent::SignedOut);
        self.notifier.success(SIGNED_OUT);
        Ok(())
    }

    /// A usable access token, refreshed once if the stored one has expired.
    ///
    /// A failed refresh ends the session (`SignedOut`).
    pub async fn access_token(&self) -> AuthResult<String> {
        let _guard = self.refresh_lock.lock().await;

        if !self.state().is_authenticated() {
            return Err(AuthError::NotSignedIn);
        }

        let stored = self.secrets.load_session()?.ok_or(AuthError::NotSignedIn)?;
        if !stored.is_expired() {
            return Ok(stored.access_token);
        }

        info!("Access token expired, refreshing");
        self.transition(AuthMachineInput::TokenExpired)?;
        self.refresh_with(&stored.refresh_token, true).await?;

        self.secrets.access_token()?.ok_or(AuthError::SessionExpired)
    }

    /// Single refresh attempt from the `Refreshing` state.
    async fn refresh_with(&self, refresh_token: &str, signed_in: bool) -> AuthResult<Session> {
        let refreshed = match self.backend.refresh_session(refresh_token).await {
            Ok(auth) => self.persist(&auth),
            Err(e) => Err(e.into()),
        };

        match refreshed {
            Ok(session) => {
                self.set_session(Some(session.clone()));
                self.transition(AuthMachineInput::RefreshSuccess)?;
                info!(user_id = %session.user_id, "Token refreshed");
                self.listeners
                    .dispatch(&AuthEvent::TokenRefreshed(session.clone()));
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, session cleared");
                self.forget();
                self.transition(AuthMachineInput::RefreshFailed)?;
                if signed_in {
                    self.listeners.dispatch(&AuthEvent::SignedOut);
                }
                Err(AuthError::SessionExpired)
            }
        }
    }
}
