//! Log file writer and subscriber assembly.
//!
//! Writes structured JSONL to an append-only file. Each line is flushed as it
//! is written so concurrent processes (a shell and a one-shot command) can
//! share one log file.

use crate::json_layer::JsonLayer;
use crate::LogConfig;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Central log file location: `~/.todo-sync/logs/dev.jsonl`.
///
/// Falls back to the working directory when no home directory is known.
pub fn default_log_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".todo-sync")
        .join("logs")
        .join("dev.jsonl")
}

/// Append-only file writer with per-line flush.
#[derive(Clone)]
pub struct CentralLogWriter {
    inner: Arc<Mutex<BufWriter<File>>>,
}

impl CentralLogWriter {
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            inner: Arc::new(Mutex::new(BufWriter::with_capacity(8192, file))),
        })
    }
}

impl Write for CentralLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock();
        let result = guard.write(buf);
        guard.flush()?;
        result
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().flush()
    }
}

/// MakeWriter implementation for tracing-subscriber
#[derive(Clone)]
pub struct WriterFactory {
    writer: CentralLogWriter,
}

impl WriterFactory {
    pub fn new(writer: CentralLogWriter) -> Self {
        Self { writer }
    }
}

impl<'a> MakeWriter<'a> for WriterFactory {
    type Writer = CentralLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer.clone()
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

pub(crate) fn init_subscriber(config: &LogConfig) {
    let log_path = config.log_path.clone().unwrap_or_else(default_log_path);

    let json_layer = match CentralLogWriter::new(&log_path) {
        Ok(writer) => Some(JsonLayer::new(
            config.service_name.clone(),
            WriterFactory::new(writer),
        )),
        Err(e) => {
            eprintln!("warning: cannot open log file {}: {}", log_path.display(), e);
            None
        }
    };

    // Without a file there must still be somewhere for events to go.
    let stderr_enabled = config.also_stderr || json_layer.is_none();
    let stderr_layer = stderr_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .with_writer(io::stderr)
            .with_ansi(true)
            .with_filter(env_filter(&config.default_level))
    });

    let file_enabled = json_layer.is_some();
    let installed = tracing_subscriber::registry()
        .with(json_layer.map(|l| l.with_filter(env_filter(&config.default_level))))
        .with(stderr_layer)
        .try_init()
        .is_ok();

    if installed && file_enabled {
        tracing::debug!(
            log_path = %log_path.display(),
            service = %config.service_name,
            "logging initialized"
        );
    }
}
