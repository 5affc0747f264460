use crate::application::ports::notifier::{NotificationSpec, Notifier, Urgency};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

/// Notifier for headless hosts: notifications become log events.
#[derive(Debug, Default)]
pub struct LogNotifier {
    badge: AtomicU64,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn badge(&self) -> u64 {
        self.badge.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn show(&self, notification: &NotificationSpec) -> Result<(), AppError> {
        match notification.urgency {
            Urgency::High => tracing::warn!(
                tag = %notification.tag,
                title = %notification.title,
                body = %notification.body,
                "alert notification"
            ),
            Urgency::Normal => tracing::info!(
                tag = %notification.tag,
                title = %notification.title,
                "notification"
            ),
            Urgency::Low => tracing::debug!(
                tag = %notification.tag,
                title = %notification.title,
                "notification"
            ),
        }
        Ok(())
    }

    async fn set_badge(&self, count: u64) -> Result<(), AppError> {
        if self.badge.swap(count, Ordering::Relaxed) != count {
            tracing::info!(count, "badge updated");
        }
        Ok(())
    }
}
