//! Logging initialization.
//!
//! Thin wrapper over the observability package: every process writes JSONL
//! to `~/.todo-sync/logs/dev.jsonl`, tagged with its service name.

use std::path::PathBuf;

/// Initialize logging for a process.
///
/// `TODO_SYNC_LOG_STDERR=1` mirrors events to stderr as well. `RUST_LOG`
/// takes precedence over `level`.
///
/// ```ignore
/// init_logging("cli", "info", Some(paths.log_file()));
/// tracing::info!("started");
/// ```
pub fn init_logging(service_name: &str, level: &str, log_path: Option<PathBuf>) {
    let also_stderr = std::env::var("TODO_SYNC_LOG_STDERR")
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);

    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: parse_level(level).as_str().to_ascii_lowercase(),
        log_path,
        also_stderr,
    });
}

/// Parse a log level string into a tracing Level. Unknown values map to INFO.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.trim().to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
