//! Operator notifications
//!
//! Results and failures of room operations are surfaced to the operator as
//! structured notifications (title + details). The center keeps a bounded
//! history for the status API and fans new entries out to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::error::RoomError;

const DEFAULT_CAPACITY: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A single operator-facing notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub level: NotificationLevel,
    pub title: String,
    pub content: String,
    pub at: DateTime<Utc>,
}

/// Shared sink for operator notifications
#[derive(Clone)]
pub struct NotificationCenter {
    history: Arc<Mutex<VecDeque<Notification>>>,
    capacity: usize,
    tx: broadcast::Sender<Notification>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            history: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
            tx,
        }
    }

    pub fn info(&self, title: impl Into<String>, content: impl Into<String>) {
        self.push(NotificationLevel::Info, title.into(), content.into());
    }

    pub fn error(&self, title: impl Into<String>, content: impl Into<String>) {
        self.push(NotificationLevel::Error, title.into(), content.into());
    }

    /// Report a structured result, pretty-printed as JSON
    pub fn result(&self, title: impl Into<String>, value: &serde_json::Value) {
        let content = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
        self.info(title, content);
    }

    pub fn failure(&self, title: impl Into<String>, err: &RoomError) {
        self.error(title, err.to_string());
    }

    /// Entries currently retained, oldest first
    pub fn recent(&self) -> Vec<Notification> {
        match self.history.lock() {
            Ok(history) => history.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    pub fn last(&self) -> Option<Notification> {
        self.recent().pop()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    fn push(&self, level: NotificationLevel, title: String, content: String) {
        match level {
            NotificationLevel::Info => info!("{}: {}", title, content),
            NotificationLevel::Error => error!("{}: {}", title, content),
        }

        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            level,
            title,
            content,
            at: Utc::now(),
        };

        {
            let mut history = match self.history.lock() {
                Ok(history) => history,
                Err(poisoned) => poisoned.into_inner(),
            };
            if history.len() == self.capacity {
                history.pop_front();
            }
            history.push_back(notification.clone());
        }

        // No subscribers is fine
        let _ = self.tx.send(notification);
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded() {
        let center = NotificationCenter::with_capacity(2);
        center.info("a", "1");
        center.info("b", "2");
        center.error("c", "3");

        let titles: Vec<_> = center.recent().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["b", "c"]);
        assert_eq!(center.last().map(|n| n.level), Some(NotificationLevel::Error));
    }

    #[test]
    fn result_is_pretty_json() {
        let center = NotificationCenter::new();
        center.result("face", &serde_json::json!({ "score": 0.9 }));
        let last = center.last().expect("notification");
        assert!(last.content.contains("\"score\": 0.9"));
    }
}
