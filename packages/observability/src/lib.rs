//! # Observability
//!
//! Structured logging for the todo-sync workspace.
//!
//! Binaries call [`init_with_config`] once at startup and use the standard
//! `tracing` macros everywhere else. Library crates never install a
//! subscriber; they only emit events.
//!
//! Every event is written as one JSON object per line to
//! `~/.todo-sync/logs/dev.jsonl` (or [`LogConfig::log_path`]):
//!
//! - `tail -f ~/.todo-sync/logs/dev.jsonl | jq` for pretty JSON
//! - `lnav ~/.todo-sync/logs/dev.jsonl` for interactive exploration
//!
//! An optional compact stderr layer mirrors the stream for foreground use.
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "cli".into(),
//!     default_level: "debug".into(),
//!     ..Default::default()
//! });
//! tracing::info!("ready");
//! ```

mod json_layer;
mod writer;

use std::path::PathBuf;

pub use json_layer::{JsonLayer, LogEntry};
pub use writer::{default_log_path, CentralLogWriter, WriterFactory};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "cli", "shell").
    /// Included in every log line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.todo-sync/logs/dev.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr for immediate feedback.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "unknown".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize the logging layer with default settings.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Initialize the logging layer with custom configuration.
///
/// Installing a second global subscriber is a no-op, so tests and embedding
/// binaries may call this more than once.
///
/// When the log file cannot be opened, logging degrades to stderr only.
pub fn init_with_config(config: LogConfig) {
    writer::init_subscriber(&config);
}

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, instrument, trace, warn};

/// Re-export Level for advanced filtering.
pub use tracing::Level;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.service_name, "unknown");
        assert_eq!(config.default_level, "info");
        assert!(config.log_path.is_none());
        assert!(!config.also_stderr);
    }
}
