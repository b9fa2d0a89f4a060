//! Notification sink abstraction.
//!
//! Notifications are fire-and-forget: implementations log their own
//! delivery failures and never hand them back to the pipeline.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// How loudly a notification should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Error,
}

/// Delivers a human-readable message about a subject (usually a workload).
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str, subject: &str, severity: Severity);
}

/// Notifier that only writes to the log.
///
/// Used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: &str, subject: &str, severity: Severity) {
        match severity {
            Severity::Info => info!(%subject, "{}", message),
            Severity::Warn => warn!(%subject, "{}", message),
            Severity::Error => error!(%subject, "{}", message),
        }
    }
}

/// A notification captured by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub subject: String,
    pub severity: Severity,
}

/// Notifier that keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Notifications sent about one subject.
    pub fn sent_for(&self, subject: &str) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.subject == subject)
            .collect()
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str, subject: &str, severity: Severity) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(Notification {
                message: message.to_string(),
                subject: subject.to_string(),
                severity,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_notifier_filters_by_subject() {
        let notifier = RecordingNotifier::new();
        notifier.notify("updated", "svc-a", Severity::Info).await;
        notifier.notify("failed", "svc-b", Severity::Error).await;

        assert_eq!(notifier.sent().len(), 2);
        let for_b = notifier.sent_for("svc-b");
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn log_notifier_accepts_every_severity() {
        let notifier = LogNotifier;
        notifier.notify("m", "s", Severity::Info).await;
        notifier.notify("m", "s", Severity::Warn).await;
        notifier.notify("m", "s", Severity::Error).await;
    }
}
