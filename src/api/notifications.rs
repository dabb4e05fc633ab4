// Notification sink for watch session transitions
//
// Every notification is logged through tracing and fanned out on a broadcast
// channel; the /events WebSocket forwards it to connected front-ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Broadcast channel capacity
const BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub session_id: Option<Uuid>,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn new(session_id: Option<Uuid>, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            session_id,
            message: message.into(),
            severity,
            timestamp: Utc::now(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        let session = notification
            .session_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());

        match notification.severity {
            Severity::Info => info!(session = %session, "ℹ️ {}", notification.message),
            Severity::Success => info!(session = %session, "✅ {}", notification.message),
            Severity::Warning => warn!(session = %session, "⚠️ {}", notification.message),
            Severity::Error => error!(session = %session, "❌ {}", notification.message),
        }

        // No subscribers is fine
        if self.tx.send(notification).is_err() {
            debug!("📡 Notification dropped, no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notification_broadcast() {
        let notifier = BroadcastNotifier::new();
        let mut rx = notifier.subscribe();
        let session_id = Uuid::new_v4();

        notifier.notify(Notification::new(
            Some(session_id),
            "Payment settled",
            Severity::Success,
        ));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.session_id, Some(session_id));
        assert_eq!(received.severity, Severity::Success);
        assert_eq!(received.message, "Payment settled");
    }

    #[test]
    fn test_notify_without_subscribers() {
        let notifier = BroadcastNotifier::new();
        assert_eq!(notifier.subscriber_count(), 0);
        notifier.notify(Notification::new(None, "nobody listening", Severity::Info));
    }

    #[test]
    fn test_severity_serialization() {
        assert_eq!(serde_json::to_string(&Severity::Warning).unwrap(), "\"warning\"");
    }
}
