//! Remote todo table access.

use crate::model::{CompletedPatch, NewTodo, Todo};
use async_trait::async_trait;
use supabase_platform::{eq, PlatformClient, PlatformResult};
use uuid::Uuid;

/// The four table operations the synchronizer performs.
#[async_trait]
pub trait TodoStore: Send + Sync {
    /// All of `user_id`'s todos, newest first.
    async fn fetch(&self, user_id: &str, access_token: &str) -> PlatformResult<Vec<Todo>>;

    async fn insert(&self, todo: &NewTodo, access_token: &str) -> PlatformResult<()>;

    async fn set_completed(&self, id: Uuid, completed: bool, access_token: &str)
        -> PlatformResult<()>;

    async fn delete(&self, id: Uuid, access_token: &str) -> PlatformResult<()>;
}

/// [`TodoStore`] over PostgREST.
#[derive(Debug, Clone)]
pub struct PlatformTodoStore {
    client: PlatformClient,
    table: String,
}

impl PlatformTodoStore {
    pub fn new(client: PlatformClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[async_trait]
impl TodoStore for PlatformTodoStore {
    async fn fetch(&self, user_id: &str, access_token: &str) -> PlatformResult<Vec<Todo>> {
        let query = [
            ("select", "*".to_string()),
            ("user_id", eq(user_id)),
            ("order", "created_at.desc".to_string()),
        ];
        self.client.select(&self.table, &query, access_token).await
    }

    async fn insert(&self, todo: &NewTodo, access_token: &str) -> PlatformResult<()> {
        self.client.insert(&self.table, todo, access_token).await
    }

    async fn set_completed(
        &self,
        id: Uuid,
        completed: bool,
        access_token: &str,
    ) -> PlatformResult<()> {
        self.client
            .update(
                &self.table,
                &[("id", eq(id))],
                &CompletedPatch { completed },
                access_token,
            )
            .await
    }

    async fn delete(&self, id: Uuid, access_token: &str) -> PlatformResult<()> {
        self.client
            .delete(&self.table, &[("id", eq(id))], access_token)
            .await
    }
}
