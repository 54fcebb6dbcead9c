//! The Todo Synchronizer.
//!
//! Lifecycle per signed-in user: [`TodoSynchronizer::start`] fetches the
//! list, then subscribes to change notifications and reloads on each one;
//! [`TodoSynchronizer::stop`] releases the subscription and clears the list.
//!
//! Mutations never touch the local list. Their effect shows up through the
//! reload that the resulting change notification triggers.

use crate::feed::{ChangeFeed, FeedEvent, FeedHandle};
use crate::list::TodoList;
use crate::model::{NewTodo, Todo};
use crate::store::TodoStore;
use crate::token::TokenSource;
use crate::{SyncError, SyncResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use todo_config_and_utils::Notifier;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const FETCH_FAILED: &str = "Failed to fetch todos";
pub const ADD_FAILED: &str = "Failed to add todo";
pub const ADD_SUCCEEDED: &str = "Todo added successfully!";
pub const UPDATE_FAILED: &str = "Failed to update todo";
pub const DELETE_FAILED: &str = "Failed to delete todo";
pub const DELETE_SUCCEEDED: &str = "Todo deleted successfully!";

/// Cheap to clone; clones share one list and one subscription.
#[derive(Clone)]
pub struct TodoSynchronizer {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<dyn TodoStore>,
    feed: Arc<dyn ChangeFeed>,
    tokens: Arc<dyn TokenSource>,
    notifier: Notifier,
    table: String,
    list: TodoList,
    user_id: RwLock<Option<String>>,
    live: Mutex<Option<Live>>,
    subscriptions: AtomicU64,
}

struct Live {
    generation: u64,
    handle: Box<dyn FeedHandle>,
    listener: JoinHandle<()>,
}

impl TodoSynchronizer {
    pub fn new(
        store: Arc<dyn TodoStore>,
        feed: Arc<dyn ChangeFeed>,
        tokens: Arc<dyn TokenSource>,
        table: impl Into<String>,
        notifier: Notifier,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                feed,
                tokens,
                notifier,
                table: table.into(),
                list: TodoList::new(),
                user_id: RwLock::new(None),
                live: Mutex::new(None),
                subscriptions: AtomicU64::new(0),
            }),
        }
    }

    pub fn list(&self) -> &TodoList {
        &self.inner.list
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.user_id.read().clone()
    }

    pub async fn is_live(&self) -> bool {
        self.inner.live.lock().await.is_some()
    }

    /// Scope the synchronizer to `user_id` without subscribing.
    ///
    /// Enough for one-shot fetches and mutations.
    pub fn attach(&self, user_id: impl Into<String>) {
        let user_id = user_id.into();
        let mut current = self.inner.user_id.write();
        if current.as_deref() != Some(user_id.as_str()) {
            debug!(user_id = %user_id, "Synchronizer attached");
            *current = Some(user_id);
        }
    }

    /// Load `user_id`'s todos, then keep them live.
    ///
    /// The first fetch completes before this returns. Starting again for the
    /// same user is a no-op while the feed is open; starting for a different
    /// user stops the previous one first. Once the feed has closed, starting
    /// again reloads and resubscribes.
    pub async fn start(&self, user_id: &str) -> SyncResult<()> {
        let mut live = self.inner.live.lock().await;
        if live.is_some() {
            if self.user_id().as_deref() == Some(user_id) {
                return Ok(());
            }
            self.inner.shut_down(&mut live).await;
        }

        self.attach(user_id);
        // A failed first fetch is already reported; the subscription still
        // opens so the next change reloads.
        let _ = self.inner.fetch().await;

        let access_token = self.inner.tokens.access_token().await?;
        let subscription = self.inner.feed.subscribe(&self.inner.table, &access_token).await?;

        let generation = self.inner.subscriptions.fetch_add(1, Ordering::SeqCst) + 1;
        let listener = tokio::spawn(listen(
            Arc::clone(&self.inner),
            generation,
            subscription.events,
        ));
        *live = Some(Live {
            generation,
            handle: subscription.handle,
            listener,
        });
        info!(user_id = %user_id, table = %self.inner.table, "Todo sync started");
        Ok(())
    }

    /// Release the subscription and clear the list.
    ///
    /// The list is cleared even if nothing was running.
    pub async fn stop(&self) {
        let mut live = self.inner.live.lock().await;
        self.inner.shut_down(&mut live).await;
    }

    /// Forward a refreshed access token to the live subscription.
    pub async fn set_access_token(&self, access_token: &str) {
        if let Some(live) = self.inner.live.lock().await.as_ref() {
            live.handle.set_access_token(access_token);
        }
    }

    /// Full reload. On failure the list is unchanged and one notice is sent.
    pub async fn fetch(&self) -> SyncResult<()> {
        self.inner.fetch().await
    }

    /// Take the draft, leaving it empty, and add it as a todo.
    ///
    /// Blank drafts are dropped without a request and return `None`.
    pub fn submit_draft(&self, draft: &mut String) -> Option<JoinHandle<SyncResult<()>>> {
        let draft = std::mem::take(draft);
        let title = draft.trim();
        if title.is_empty() {
            return None;
        }
        Some(self.add(title))
    }

    /// Insert a todo owned by the user attached when this is called.
    pub fn add(&self, title: &str) -> JoinHandle<SyncResult<()>> {
        let inner = Arc::clone(&self.inner);
        let user_id = self.user_id();
        let title = title.trim().to_string();
        tokio::spawn(async move {
            let result = inner.add(user_id, title).await;
            inner.report(result, ADD_FAILED, Some(ADD_SUCCEEDED))
        })
    }

    /// Flip `completed` on the remote row. No local rollback on failure.
    pub fn toggle(&self, todo: &Todo) -> JoinHandle<SyncResult<()>> {
        let inner = Arc::clone(&self.inner);
        let user_id = self.user_id();
        let (id, completed) = (todo.id, !todo.completed);
        tokio::spawn(async move {
            let result = inner.set_completed(user_id, id, completed).await;
            inner.report(result, UPDATE_FAILED, None)
        })
    }

    pub fn delete(&self, id: Uuid) -> JoinHandle<SyncResult<()>> {
        let inner = Arc::clone(&self.inner);
        let user_id = self.user_id();
        tokio::spawn(async move {
            let result = inner.delete(user_id, id).await;
            inner.report(result, DELETE_FAILED, Some(DELETE_SUCCEEDED))
        })
    }
}

impl std::fmt::Debug for TodoSynchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoSynchronizer")
            .field("table", &self.inner.table)
            .field("user_id", &self.user_id())
            .field("list", &self.inner.list)
            .finish()
    }
}

impl Inner {
    fn current_user(&self) -> SyncResult<String> {
        self.user_id.read().clone().ok_or(SyncError::NotSignedIn)
    }

    async fn fetch(&self) -> SyncResult<()> {
        let ticket = self.list.ticket();
        let result = async {
            let user_id = self.current_user()?;
            let access_token = self.tokens.access_token().await?;
            Ok::<_, SyncError>(self.store.fetch(&user_id, &access_token).await?)
        }
        .await;

        match result {
            Ok(todos) => {
                let count = todos.len();
                if self.list.apply(ticket, todos) {
                    debug!(count, "Todos fetched");
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Fetch failed");
                self.notifier.error(FETCH_FAILED);
                Err(e)
            }
        }
    }

    async fn add(&self, user_id: Option<String>, title: String) -> SyncResult<()> {
        let user_id = user_id.ok_or(SyncError::NotSignedIn)?;
        let access_token = self.tokens.access_token().await?;
        let row = NewTodo::new(title, user_id);
        self.store.insert(&row, &access_token).await?;
        Ok(())
    }

    async fn set_completed(
        &self,
        user_id: Option<String>,
        id: Uuid,
        completed: bool,
    ) -> SyncResult<()> {
        user_id.ok_or(SyncError::NotSignedIn)?;
        let access_token = self.tokens.access_token().await?;
        self.store.set_completed(id, completed, &access_token).await?;
        Ok(())
    }

    async fn delete(&self, user_id: Option<String>, id: Uuid) -> SyncResult<()> {
        user_id.ok_or(SyncError::NotSignedIn)?;
        let access_token = self.tokens.access_token().await?;
        self.store.delete(id, &access_token).await?;
        Ok(())
    }

    /// Turn a mutation outcome into its fixed notice.
    fn report(
        &self,
        result: SyncResult<()>,
        failure: &str,
        success: Option<&str>,
    ) -> SyncResult<()> {
        match &result {
            Ok(()) => {
                if let Some(message) = success {
                    self.notifier.success(message);
                }
            }
            Err(e) => {
                warn!(error = %e, operation = failure, "Mutation failed");
                self.notifier.error(failure);
            }
        }
        result
    }

    async fn shut_down(&self, live: &mut Option<Live>) {
        *self.user_id.write() = None;
        self.list.clear();

        if let Some(mut current) = live.take() {
            current.listener.abort();
            current.handle.release().await;
            info!(table = %self.table, "Todo sync stopped");
        }
    }
}

async fn listen(
    inner: Arc<Inner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<FeedEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            FeedEvent::Subscribed => debug!(table = %inner.table, "Change feed subscribed"),
            FeedEvent::Changed => {
                let _ = inner.fetch().await;
            }
            FeedEvent::Error(reason) => warn!(reason = %reason, "Change feed error"),
            FeedEvent::Closed => {
                warn!(table = %inner.table, "Change feed closed");
                break;
            }
        }
    }

    // Free the slot so the next start resubscribes. A newer subscription
    // owns the slot if the generation moved on.
    let mut live = inner.live.lock().await;
    if live.as_ref().map(|l| l.generation) == Some(generation) {
        if let Some(mut closed) = live.take() {
            closed.handle.release().await;
        }
    }
}
