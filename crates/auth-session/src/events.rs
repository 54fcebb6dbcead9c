//! Auth event fan-out.
//!
//! Callbacks run synchronously on the task that caused the event, outside any
//! internal lock, so a callback may itself subscribe or unsubscribe.

use crate::manager::Session;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Result of the startup restore. Emitted once.
    InitialSession(Option<Session>),
    SignedIn(Session),
    SignedOut,
    TokenRefreshed(Session),
}

impl AuthEvent {
    /// The session this event leaves in place, if any.
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthEvent::InitialSession(session) => session.as_ref(),
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => Some(session),
            AuthEvent::SignedOut => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthEvent::InitialSession(_) => "INITIAL_SESSION",
            AuthEvent::SignedIn(_) => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed(_) => "TOKEN_REFRESHED",
        }
    }
}

pub type AuthCallback = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Listeners {
    inner: Mutex<ListenerTable>,
}

#[derive(Default)]
struct ListenerTable {
    next_id: u64,
    entries: Vec<(u64, AuthCallback)>,
}

impl Listeners {
    pub(crate) fn add(self: &Arc<Self>, callback: AuthCallback) -> AuthSubscription {
        let mut table = self.inner.lock();
        let id = table.next_id;
        table.next_id += 1;
        table.entries.push((id, callback));

        AuthSubscription {
            id,
            listeners: Arc::downgrade(self),
        }
    }

    fn remove(&self, id: u64) {
        self.inner.lock().entries.retain(|(entry_id, _)| *entry_id != id);
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub(crate) fn dispatch(&self, event: &AuthEvent) {
        let callbacks: Vec<AuthCallback> = self
            .inner
            .lock()
            .entries
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        tracing::debug!(event = event.name(), listeners = callbacks.len(), "auth event");
        for callback in callbacks {
            callback(event);
        }
    }
}

/// Keeps an `on_auth_state_change` registration alive.
///
/// Dropping the handle unsubscribes.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct AuthSubscription {
    id: u64,
    listeners: Weak<Listeners>,
}

impl AuthSubscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.remove(self.id);
        }
    }
}

impl std::fmt::Debug for AuthSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSubscription").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(listeners: &Arc<Listeners>) -> (Arc<AtomicUsize>, AuthSubscription) {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let sub = listeners.add(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        (hits, sub)
    }

    #[test]
    fn test_dispatch_reaches_all_listeners() {
        let listeners = Arc::new(Listeners::default());
        let (a, _sa) = counter(&listeners);
        let (b, _sb) = counter(&listeners);

        listeners.dispatch(&AuthEvent::SignedOut);

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_and_drop_release() {
        let listeners = Arc::new(Listeners::default());
        let (a, sa) = counter(&listeners);
        let (b, sb) = counter(&listeners);
        assert_eq!(listeners.len(), 2);

        sa.unsubscribe();
        drop(sb);
        assert_eq!(listeners.len(), 0);

        listeners.dispatch(&AuthEvent::SignedOut);
        assert_eq!(a.load(Ordering::SeqCst), 0);
        assert_eq!(b.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_subscription_outliving_registry_is_harmless() {
        let listeners = Arc::new(Listeners::default());
        let (_hits, sub) = counter(&listeners);
        drop(listeners);
        drop(sub);
    }

    #[test]
    fn test_callback_may_subscribe_during_dispatch() {
        let listeners = Arc::new(Listeners::default());
        let inner = Arc::clone(&listeners);
        let nested = Arc::new(Mutex::new(Vec::new()));
        let keep = Arc::clone(&nested);

        let _sub = listeners.add(Arc::new(move |_| {
            keep.lock().push(inner.add(Arc::new(|_| {})));
        }));

        listeners.dispatch(&AuthEvent::SignedOut);
        assert_eq!(listeners.len(), 2);
        nested.lock().clear();
        assert_eq!(listeners.len(), 1);
    }

    #[test]
    fn test_event_session_accessor() {
        let session = Session {
            user_id: "u".to_string(),
            email: None,
        };
        assert_eq!(
            AuthEvent::SignedIn(session.clone()).session(),
            Some(&session)
        );
        assert_eq!(AuthEvent::InitialSession(None).session(), None);
        assert_eq!(AuthEvent::SignedOut.name(), "SIGNED_OUT");
    }
}
