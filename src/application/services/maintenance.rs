use crate::application::ports::local_store::LocalStore;
use crate::shared::clock::Clock;
use crate::shared::config::{CacheConfig, RetentionConfig};
use crate::shared::error::AppError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub cache_entries_swept: u64,
    pub drafts_pruned: u64,
    pub alerts_pruned: u64,
}

/// Periodic housekeeping of the local store.
pub struct Maintenance {
    store: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
    cache: CacheConfig,
    retention: RetentionConfig,
}

impl Maintenance {
    pub fn new(
        store: Arc<dyn LocalStore>,
        clock: Arc<dyn Clock>,
        cache: CacheConfig,
        retention: RetentionConfig,
    ) -> Self {
        Self {
            store,
            clock,
            cache,
            retention,
        }
    }

    pub async fn run(&self) -> Result<MaintenanceReport, AppError> {
        let now = self.clock.now();
        let grace_ms = i64::try_from(self.cache.sweep_grace.saturating_mul(1_000)).unwrap_or(i64::MAX);

        let report = MaintenanceReport {
            cache_entries_swept: self
                .store
                .sweep_expired(now.timestamp_millis().saturating_sub(grace_ms))
                .await?,
            drafts_pruned: self
                .store
                .prune_drafts(now - Duration::days(self.retention.draft_days))
                .await?,
            alerts_pruned: self
                .store
                .prune_acknowledged(now - Duration::days(self.retention.acknowledged_alert_days))
                .await?,
        };

        if report != MaintenanceReport::default() {
            tracing::info!(
                cache = report.cache_entries_swept,
                drafts = report.drafts_pruned,
                alerts = report.alerts_pruned,
                "maintenance pruned local data"
            );
        }
        Ok(report)
    }
}
