//! Todo Synchronizer.
//!
//! Keeps a local, read-only copy of the signed-in user's todos in step with
//! the remote table:
//! - Full fetch on start and on every change notification
//! - Fire-and-forget add, toggle and delete with fixed outcome notices
//! - One writer for the local list; stale fetches are discarded
//!
//! The remote store, change feed and token source sit behind traits so the
//! synchronizer can run against fakes.

mod error;
mod feed;
mod list;
mod model;
mod store;
mod synchronizer;
mod token;

pub use error::{SyncError, SyncResult};
pub use feed::{ChangeFeed, FeedEvent, FeedHandle, FeedSubscription, RealtimeFeed};
pub use list::{FetchTicket, TodoList};
pub use model::{CompletedPatch, NewTodo, Todo};
pub use store::{PlatformTodoStore, TodoStore};
pub use synchronizer::{
    TodoSynchronizer, ADD_FAILED, ADD_SUCCEEDED, DELETE_FAILED, DELETE_SUCCEEDED, FETCH_FAILED,
    UPDATE_FAILED,
};
pub use token::TokenSource;
