//! Row types for the `todos` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored todo. `id` and `created_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub completed: bool,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

impl Todo {
    /// First eight characters of the id, enough to address a todo from the CLI.
    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

/// Insert body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTodo {
    pub title: String,
    pub completed: bool,
    pub user_id: String,
}

impl NewTodo {
    pub fn new(title: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: false,
            user_id: user_id.into(),
        }
    }
}

/// Toggle body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletedPatch {
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_todo_from_postgrest_row() {
        let todo: Todo = serde_json::from_str(
            r#"{
                "id": "3f2b8c1e-1d4a-4c6e-9b7a-0e5f6a7b8c9d",
                "title": "Buy milk",
                "completed": false,
                "user_id": "user-1",
                "created_at": "2026-10-18T09:30:00.123456+00:00"
            }"#,
        )
        .unwrap();

        assert_eq!(todo.title, "Buy milk");
        assert!(!todo.completed);
        assert_eq!(todo.short_id(), "3f2b8c1e");
        assert_eq!(todo.created_at.timestamp(), 1_792_315_800);
    }

    #[test]
    fn test_new_todo_body() {
        let body = serde_json::to_value(NewTodo::new("Buy milk", "user-1")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"title": "Buy milk", "completed": false, "user_id": "user-1"})
        );
    }
}
