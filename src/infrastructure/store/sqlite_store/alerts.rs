use super::queries::{
    ACKNOWLEDGE_ALERT, COUNT_UNACKNOWLEDGED_ALERTS, DELETE_ACKNOWLEDGED_ALERTS, INSERT_ALERT,
    SELECT_ALERT, SELECT_ALERTS,
};
use super::{SqliteLocalStore, millis_to_datetime};
use crate::application::ports::local_store::AlertStore;
use crate::domain::entities::CriticalAlert;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, FromRow)]
struct AlertRow {
    id: String,
    kind: String,
    severity: String,
    title: String,
    body: String,
    payload: String,
    timestamp: i64,
    acknowledged: bool,
    acknowledged_at: Option<i64>,
}

impl AlertRow {
    fn into_domain(self) -> Result<CriticalAlert, AppError> {
        Ok(CriticalAlert {
            id: self.id,
            kind: self.kind.parse().map_err(AppError::ValidationError)?,
            severity: self.severity.parse().map_err(AppError::ValidationError)?,
            title: self.title,
            body: self.body,
            payload: serde_json::from_str(&self.payload)?,
            timestamp: millis_to_datetime(self.timestamp)?,
            acknowledged: self.acknowledged,
            acknowledged_at: self.acknowledged_at.map(millis_to_datetime).transpose()?,
        })
    }
}

#[async_trait]
impl AlertStore for SqliteLocalStore {
    async fn save_alert(&self, alert: &CriticalAlert) -> Result<bool, AppError> {
        let result = sqlx::query(INSERT_ALERT)
            .bind(&alert.id)
            .bind(alert.kind.as_str())
            .bind(alert.severity.as_str())
            .bind(&alert.title)
            .bind(&alert.body)
            .bind(serde_json::to_string(&alert.payload)?)
            .bind(alert.timestamp.timestamp_millis())
            .bind(alert.acknowledged)
            .bind(alert.acknowledged_at.map(|at| at.timestamp_millis()))
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_alert(&self, id: &str) -> Result<Option<CriticalAlert>, AppError> {
        let row = sqlx::query_as::<_, AlertRow>(SELECT_ALERT)
            .bind(id)
            .fetch_optional(self.pool.get_pool())
            .await?;
        row.map(AlertRow::into_domain).transpose()
    }

    async fn list_alerts(
        &self,
        include_acknowledged: bool,
    ) -> Result<Vec<CriticalAlert>, AppError> {
        let rows = sqlx::query_as::<_, AlertRow>(SELECT_ALERTS)
            .bind(include_acknowledged)
            .fetch_all(self.pool.get_pool())
            .await?;
        rows.into_iter().map(AlertRow::into_domain).collect()
    }

    async fn acknowledge_alert(&self, id: &str, at: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(ACKNOWLEDGE_ALERT)
            .bind(at.timestamp_millis())
            .bind(id)
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn unacknowledged_count(&self) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(COUNT_UNACKNOWLEDGED_ALERTS)
            .fetch_one(self.pool.get_pool())
            .await?;
        Ok(count)
    }

    async fn prune_acknowledged(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(DELETE_ACKNOWLEDGED_ALERTS)
            .bind(before.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::super::memory_store;
    use super::*;
    use crate::domain::entities::PushPayload;
    use crate::domain::value_objects::Severity;
    use chrono::Duration;

    fn alert(id: &str) -> CriticalAlert {
        let push = PushPayload {
            id: Some(id.to_string()),
            title: "Crane fault".into(),
            severity: Severity::Critical,
            ..PushPayload::default()
        };
        CriticalAlert::from_push(&push, Utc::now())
    }

    #[tokio::test]
    async fn duplicate_push_does_not_reset_acknowledgement() {
        let store = memory_store().await;
        assert!(store.save_alert(&alert("a1")).await.unwrap());
        assert!(store.acknowledge_alert("a1", Utc::now()).await.unwrap());
        assert!(!store.save_alert(&alert("a1")).await.unwrap());

        let stored = store.get_alert("a1").await.unwrap().unwrap();
        assert!(stored.acknowledged);
        assert_eq!(store.unacknowledged_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn prune_only_touches_old_acknowledged_alerts() {
        let store = memory_store().await;
        store.save_alert(&alert("old")).await.unwrap();
        store.save_alert(&alert("open")).await.unwrap();
        store
            .acknowledge_alert("old", Utc::now() - Duration::days(40))
            .await
            .unwrap();

        let pruned = store
            .prune_acknowledged(Utc::now() - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(pruned, 1);
        let remaining = store.list_alerts(true).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "open");
    }
}
