//! Best-effort notification side channel.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::Amount;
use crate::model::{PayoutStatus, UserId};

#[derive(Debug, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    PayoutRequested,
    PayoutPending,
    PayoutApproved,
    PayoutRejected,
    PayoutCompleted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::PayoutRequested => "payout_requested",
            NotificationKind::PayoutPending => "payout_pending",
            NotificationKind::PayoutApproved => "payout_approved",
            NotificationKind::PayoutRejected => "payout_rejected",
            NotificationKind::PayoutCompleted => "payout_completed",
        }
    }

    /// Event emitted after a payout lands in `status`.
    pub fn for_status(status: PayoutStatus) -> Self {
        match status {
            PayoutStatus::Pending => NotificationKind::PayoutPending,
            PayoutStatus::Approved => NotificationKind::PayoutApproved,
            PayoutStatus::Rejected => NotificationKind::PayoutRejected,
            PayoutStatus::Completed => NotificationKind::PayoutCompleted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub user_id: UserId,
    pub email: Option<String>,
    pub amount: Amount,
    pub notes: Option<String>,
}

/// Email/alert dispatcher. Failures are logged by the caller and never retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, event: NotificationEvent) -> Result<(), NotifyError>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, event: NotificationEvent) -> Result<(), NotifyError> {
        info!(
            event = event.kind.as_str(),
            user = event.user_id,
            amount = %event.amount,
            email = event.email.as_deref().unwrap_or("-"),
            "notification"
        );
        Ok(())
    }
}
