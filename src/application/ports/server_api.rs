use crate::domain::entities::QueuedChange;
use crate::domain::value_objects::Collection;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Server acknowledgement of a replayed change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayOutcome {
    pub server_id: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug)]
pub struct BatchItemOutcome {
    pub change_id: i64,
    pub result: Result<ReplayOutcome, AppError>,
}

#[async_trait]
pub trait ServerApi: Send + Sync {
    async fn health(&self) -> Result<(), AppError>;
    async fn replay(&self, change: &QueuedChange) -> Result<ReplayOutcome, AppError>;
    /// Changes missing from the server response come back as failures.
    async fn replay_batch(
        &self,
        changes: &[QueuedChange],
    ) -> Result<Vec<BatchItemOutcome>, AppError>;
    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<Value>, AppError>;
    async fn acknowledge_alert(
        &self,
        alert_id: &str,
        acknowledged_at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}
