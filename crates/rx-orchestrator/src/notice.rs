//! Operator-facing notices. Every notice is mirrored as a tracing event.

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Sending half of the notice channel; cheap to clone.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: flume::Sender<Notice>,
}

impl Notifier {
    pub fn channel() -> (Self, flume::Receiver<Notice>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }

    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Info | NoticeLevel::Success => info!(notice = %message),
            NoticeLevel::Warning => warn!(notice = %message),
            NoticeLevel::Error => error!(notice = %message),
        }
        // Nobody listening is fine.
        let _ = self.tx.send(Notice { level, message });
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(NoticeLevel::Error, message);
    }
}
