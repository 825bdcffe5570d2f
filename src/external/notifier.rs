//! Notification boundary and the post-commit outbox that feeds it.
//!
//! Nothing here may run inside a database transaction: a failed push must never
//! undo a committed promotion or refund.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    WaitlistPromoted,
    ReservationApproved,
    ReservationRejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub subject_id: Uuid,
    pub message: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> Result<(), String>;
}

/// Default delivery: a log line. Push/email gateways replace this.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: Notification) -> Result<(), String> {
        log::info!(
            "Notify user {} ({:?}): {}",
            notification.user_id,
            notification.kind,
            notification.message
        );
        Ok(())
    }
}

/// Side effects collected while a transaction is open, sent once it has committed.
/// Dropping it without `dispatch` discards them, which is what a rollback wants.
#[derive(Debug, Default)]
pub struct PostCommit {
    pending: Vec<Notification>,
}

impl PostCommit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: Notification) {
        self.pending.push(notification);
    }

    pub fn dispatch(self, notifier: &Arc<dyn Notifier>) {
        for notification in self.pending {
            let notifier = notifier.clone();
            tokio::spawn(async move {
                let user_id = notification.user_id;
                if let Err(e) = notifier.send(notification).await {
                    log::error!("Failed to notify user {user_id}: {e}");
                }
            });
        }
    }
}
