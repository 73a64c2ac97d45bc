//! Operator notifications.
//!
//! Failures are reported here instead of aborting: every notification is
//! logged and broadcast to whoever renders them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub level: Level,
    pub message: String,
    pub description: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.publish(Level::Info, message.into(), None);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(Level::Success, message.into(), None);
    }

    pub fn error(&self, message: impl Into<String>, description: impl Into<String>) {
        self.publish(Level::Error, message.into(), Some(description.into()));
    }

    fn publish(&self, level: Level, message: String, description: Option<String>) {
        match level {
            Level::Error => tracing::warn!(?description, "{}", message),
            _ => tracing::info!("{}", message),
        }
        // No subscribers is fine.
        let _ = self.tx.send(Notification {
            level,
            message,
            description,
            timestamp: Utc::now(),
        });
    }
}
