//! Core types, configuration, and utilities shared by the todo-sync crates.

mod config;
mod error;
mod logging;
pub mod notice;
mod paths;

pub use config::{
    Config, DEFAULT_EMAIL_REDIRECT, DEFAULT_LOG_LEVEL, DEFAULT_SUPABASE_PUBLISHABLE_KEY,
    DEFAULT_SUPABASE_URL, DEFAULT_TODOS_TABLE,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use notice::{Notice, NoticeLevel, NoticeReceiver, Notifier};
pub use paths::Paths;
