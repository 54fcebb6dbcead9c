//! Process wiring: one platform client, one session manager, one synchronizer.

use anyhow::{Context, Result};
use auth_session::{Session, SessionManager};
use realtime_feed::RealtimeConfig;
use session_store::{FileStorage, SecretsManager};
use std::sync::Arc;
use supabase_platform::PlatformClient;
use todo_config_and_utils::{Config, NoticeReceiver, Notifier, Paths};
use todo_sync::{PlatformTodoStore, RealtimeFeed, TodoSynchronizer};
use tracing::debug;

pub struct App {
    pub sessions: Arc<SessionManager>,
    pub sync: TodoSynchronizer,
    pub notices: NoticeReceiver,
}

impl App {
    pub fn build(config: &Config, paths: &Paths) -> Result<Self> {
        paths.ensure_dirs().context("creating data directory")?;

        let platform = PlatformClient::new(&config.supabase_url, &config.supabase_publishable_key)
            .context("configuring platform client")?;
        let realtime = RealtimeConfig::new(platform.realtime_url()?);
        let (notifier, notices) = Notifier::channel();

        let secrets = SecretsManager::new(Box::new(FileStorage::new(paths.session_file())));
        let sessions = Arc::new(SessionManager::new(
            Arc::new(platform.clone()),
            secrets,
            config.email_redirect_to.clone(),
            notifier.clone(),
        ));

        let sync = TodoSynchronizer::new(
            Arc::new(PlatformTodoStore::new(platform, config.todos_table.clone())),
            Arc::new(RealtimeFeed::new(realtime)),
            sessions.clone(),
            config.todos_table.clone(),
            notifier,
        );

        debug!(api_url = %config.supabase_url, table = %config.todos_table, "App wired");
        Ok(Self {
            sessions,
            sync,
            notices,
        })
    }

    /// Restore the persisted session, if any.
    pub async fn restore(&self) -> Result<Option<Session>> {
        Ok(self.sessions.restore().await?)
    }

    /// Restore and require a signed-in user; the synchronizer is scoped to them.
    pub async fn require_session(&self) -> Result<Session> {
        match self.restore().await? {
            Some(session) => {
                self.sync.attach(session.user_id.clone());
                Ok(session)
            }
            None => anyhow::bail!("Not signed in. Run 'todo-sync login' first"),
        }
    }
}
