//! Transient user-facing notices.
//!
//! Components report outcomes ("Signed in successfully!", "Failed to add todo")
//! through a [`Notifier`]; the front-end owns the [`NoticeReceiver`] and
//! decides how to render them. Sending never blocks and never fails: once the
//! receiver is gone notices are dropped.

use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;

/// Cloneable sending half of the notice channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl Notifier {
    pub fn channel() -> (Self, NoticeReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A notifier that discards everything.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn notify(&self, notice: Notice) {
        tracing::debug!(level = ?notice.level, message = %notice.message, "notice");
        if let Some(tx) = &self.tx {
            let _ = tx.send(notice);
        }
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(Notice::success(message));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(Notice::error(message));
    }
}
