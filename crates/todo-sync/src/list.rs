//! The local todo list.
//!
//! All writes go through [`TodoList::apply`] and [`TodoList::clear`] under one
//! lock. A fetch takes a [`FetchTicket`] before it starts; its result is
//! applied only if no later ticket has been applied and the list has not
//! been cleared since the ticket was issued.

use crate::model::Todo;
use parking_lot::Mutex;
use tokio::sync::watch;
use uuid::Uuid;

/// Issued at the start of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FetchTicket(u64);

#[derive(Debug, Default)]
struct Generations {
    issued: u64,
    applied: u64,
    cleared_at: u64,
}

pub struct TodoList {
    generations: Mutex<Generations>,
    todos: watch::Sender<Vec<Todo>>,
}

impl TodoList {
    pub fn new() -> Self {
        let (todos, _) = watch::channel(Vec::new());
        Self {
            generations: Mutex::new(Generations::default()),
            todos,
        }
    }

    pub fn ticket(&self) -> FetchTicket {
        let mut generations = self.generations.lock();
        generations.issued += 1;
        FetchTicket(generations.issued)
    }

    /// Replace the list with a fetch result. Returns `false` if the ticket is stale.
    pub fn apply(&self, ticket: FetchTicket, todos: Vec<Todo>) -> bool {
        let mut generations = self.generations.lock();
        if ticket.0 <= generations.applied || ticket.0 <= generations.cleared_at {
            tracing::debug!(ticket = ticket.0, applied = generations.applied, "Discarding stale fetch");
            return false;
        }
        generations.applied = ticket.0;
        self.todos.send_replace(todos);
        true
    }

    /// Empty the list and invalidate every outstanding ticket.
    pub fn clear(&self) {
        let mut generations = self.generations.lock();
        generations.cleared_at = generations.issued;
        self.todos.send_replace(Vec::new());
    }

    pub fn snapshot(&self) -> Vec<Todo> {
        self.todos.borrow().clone()
    }

    /// Watch the list; every apply or clear marks the receiver changed.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Todo>> {
        self.todos.subscribe()
    }

    pub fn get(&self, id: Uuid) -> Option<Todo> {
        self.todos.borrow().iter().find(|t| t.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.todos.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.todos.borrow().is_empty()
    }
}

impl Default for TodoList {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TodoList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoList").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn todo(title: &str) -> Todo {
        Todo {
            id: Uuid::new_v4(),
            title: title.to_string(),
            completed: false,
            user_id: "u1".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_apply_replaces_whole_list() {
        let list = TodoList::new();
        assert!(list.apply(list.ticket(), vec![todo("a"), todo("b")]));
        assert_eq!(list.len(), 2);

        assert!(list.apply(list.ticket(), vec![todo("c")]));
        let titles: Vec<_> = list.snapshot().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["c"]);
    }

    #[test]
    fn test_older_ticket_cannot_overwrite_newer() {
        let list = TodoList::new();
        let slow = list.ticket();
        let fast = list.ticket();

        assert!(list.apply(fast, vec![todo("new")]));
        assert!(!list.apply(slow, vec![todo("old")]));
        assert_eq!(list.snapshot()[0].title, "new");
    }

    #[test]
    fn test_clear_invalidates_outstanding_tickets() {
        let list = TodoList::new();
        assert!(list.apply(list.ticket(), vec![todo("a")]));

        let in_flight = list.ticket();
        list.clear();
        assert!(list.is_empty());

        assert!(!list.apply(in_flight, vec![todo("a")]));
        assert!(list.is_empty());

        assert!(list.apply(list.ticket(), vec![todo("b")]));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_get_by_id() {
        let list = TodoList::new();
        let wanted = todo("wanted");
        list.apply(list.ticket(), vec![todo("other"), wanted.clone()]);

        assert_eq!(list.get(wanted.id), Some(wanted));
        assert_eq!(list.get(Uuid::new_v4()), None);
    }

    #[tokio::test]
    async fn test_subscribers_see_updates() {
        let list = TodoList::new();
        let mut rx = list.subscribe();

        list.apply(list.ticket(), vec![todo("a")]);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().len(), 1);

        list.clear();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_empty());
    }
}
