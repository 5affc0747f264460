use super::queries::{
    COUNT_CHANGES_BY_STATUS, DELETE_CHANGE, DELETE_FAILED_CHANGES, INSERT_CHANGE,
    RECORD_CHANGE_FAILURE, REKEY_CHANGE, RETRY_FAILED_CHANGES, SELECT_CHANGE,
    SELECT_CHANGES_FOR_RECORD, SELECT_FAILED_CHANGES, SELECT_QUEUED_CHANGES,
};
use super::records::{remove_record, write_record};
use super::{SqliteLocalStore, millis_to_datetime};
use crate::application::ports::local_store::{ChangeQueueStore, QueueCounts, Reconciliation};
use crate::domain::entities::{QueuedChange, QueuedChangeDraft};
use crate::domain::value_objects::{LocalId, QueueStatus, RecordKey};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{FromRow, Row, SqliteConnection};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct QueuedChangeRow {
    id: i64,
    idempotency_key: String,
    tag: String,
    table_name: String,
    action: String,
    record_key: Option<String>,
    payload: String,
    created_at: i64,
    retry_count: i64,
    status: String,
    local_id: Option<String>,
    server_id: Option<String>,
    last_error: Option<String>,
    last_attempt_at: Option<i64>,
}

impl QueuedChangeRow {
    fn into_domain(self) -> Result<QueuedChange, AppError> {
        Ok(QueuedChange {
            id: self.id,
            idempotency_key: self.idempotency_key,
            tag: self.tag.parse().map_err(AppError::ValidationError)?,
            table: self.table_name.parse().map_err(AppError::ValidationError)?,
            action: self.action.parse().map_err(AppError::ValidationError)?,
            record_key: self
                .record_key
                .map(RecordKey::new)
                .transpose()
                .map_err(AppError::ValidationError)?,
            payload: serde_json::from_str(&self.payload)?,
            created_at: millis_to_datetime(self.created_at)?,
            retry_count: u32::try_from(self.retry_count).unwrap_or(u32::MAX),
            status: self.status.parse().map_err(AppError::ValidationError)?,
            local_id: self
                .local_id
                .map(LocalId::new)
                .transpose()
                .map_err(AppError::ValidationError)?,
            server_id: self.server_id,
            last_error: self.last_error,
            last_attempt_at: self.last_attempt_at.map(millis_to_datetime).transpose()?,
        })
    }
}

pub(super) async fn insert_change(
    conn: &mut SqliteConnection,
    draft: QueuedChangeDraft,
) -> Result<QueuedChange, AppError> {
    let idempotency_key = Uuid::new_v4().to_string();
    let created_at = Utc::now();
    let payload = serde_json::to_string(&draft.payload)?;

    let result = sqlx::query(INSERT_CHANGE)
        .bind(&idempotency_key)
        .bind(draft.tag.as_str())
        .bind(draft.table.as_str())
        .bind(draft.action.as_str())
        .bind(draft.record_key.as_ref().map(|key| key.as_str().to_string()))
        .bind(&payload)
        .bind(created_at.timestamp_millis())
        .bind(draft.local_id.as_ref().map(|id| id.as_str().to_string()))
        .execute(&mut *conn)
        .await?;

    Ok(QueuedChange {
        id: result.last_insert_rowid(),
        idempotency_key,
        tag: draft.tag,
        table: draft.table,
        action: draft.action,
        record_key: draft.record_key,
        payload: draft.payload,
        created_at,
        retry_count: 0,
        status: QueueStatus::Pending,
        local_id: draft.local_id,
        server_id: None,
        last_error: None,
        last_attempt_at: None,
    })
}

/// Points later changes of a reconciled record at its server id.
async fn rekey_changes(
    conn: &mut SqliteConnection,
    completed_id: i64,
    reconciliation: &Reconciliation,
) -> Result<u64, AppError> {
    let server_key = reconciliation.record.key.as_str();
    let rows = sqlx::query(SELECT_CHANGES_FOR_RECORD)
        .bind(reconciliation.collection.as_str())
        .bind(reconciliation.local_key.as_str())
        .bind(completed_id)
        .fetch_all(&mut *conn)
        .await?;

    let mut rewritten = 0;
    for row in rows {
        let id: i64 = row.try_get("id")?;
        let payload: String = row.try_get("payload")?;
        let mut payload: Value = serde_json::from_str(&payload)?;
        if let Some(map) = payload.as_object_mut() {
            if map.get("id").and_then(Value::as_str) == Some(reconciliation.local_key.as_str()) {
                map.insert("id".into(), Value::String(server_key.to_string()));
            }
        }

        sqlx::query(REKEY_CHANGE)
            .bind(server_key)
            .bind(server_key)
            .bind(serde_json::to_string(&payload)?)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        rewritten += 1;
    }

    Ok(rewritten)
}

#[async_trait]
impl ChangeQueueStore for SqliteLocalStore {
    async fn enqueue(&self, draft: QueuedChangeDraft) -> Result<QueuedChange, AppError> {
        let mut conn = self.pool.get_pool().acquire().await?;
        insert_change(&mut conn, draft).await
    }

    async fn get_change(&self, id: i64) -> Result<Option<QueuedChange>, AppError> {
        let row = sqlx::query_as::<_, QueuedChangeRow>(SELECT_CHANGE)
            .bind(id)
            .fetch_optional(self.pool.get_pool())
            .await?;
        row.map(QueuedChangeRow::into_domain).transpose()
    }

    async fn queued_changes(&self) -> Result<Vec<QueuedChange>, AppError> {
        let rows = sqlx::query_as::<_, QueuedChangeRow>(SELECT_QUEUED_CHANGES)
            .fetch_all(self.pool.get_pool())
            .await?;
        rows.into_iter().map(QueuedChangeRow::into_domain).collect()
    }

    async fn failed_changes(&self) -> Result<Vec<QueuedChange>, AppError> {
        let rows = sqlx::query_as::<_, QueuedChangeRow>(SELECT_FAILED_CHANGES)
            .fetch_all(self.pool.get_pool())
            .await?;
        rows.into_iter().map(QueuedChangeRow::into_domain).collect()
    }

    async fn record_failure(
        &self,
        id: i64,
        error: &str,
        max_retry: u32,
        freeze: bool,
    ) -> Result<QueuedChange, AppError> {
        let result = sqlx::query(RECORD_CHANGE_FAILURE)
            .bind(error)
            .bind(Utc::now().timestamp_millis())
            .bind(freeze)
            .bind(i64::from(max_retry))
            .bind(id)
            .execute(self.pool.get_pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Queued change {id} not found")));
        }

        self.get_change(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Queued change {id} not found")))
    }

    async fn complete_change(
        &self,
        id: i64,
        reconciliation: Option<Reconciliation>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.get_pool().begin().await?;

        if let Some(reconciliation) = reconciliation.as_ref() {
            remove_record(&mut tx, reconciliation.collection, &reconciliation.local_key).await?;
            write_record(&mut tx, reconciliation.collection, &reconciliation.record).await?;
            let rewritten = if reconciliation.local_key == reconciliation.record.key {
                0
            } else {
                rekey_changes(&mut tx, id, reconciliation).await?
            };
            tracing::debug!(
                collection = %reconciliation.collection,
                local_key = %reconciliation.local_key,
                server_key = %reconciliation.record.key,
                rewritten,
                "reconciled local record"
            );
        }

        sqlx::query(DELETE_CHANGE)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn retry_failed(&self, id: Option<i64>) -> Result<u64, AppError> {
        let result = sqlx::query(RETRY_FAILED_CHANGES)
            .bind(id)
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn clear_failed(&self, id: Option<i64>) -> Result<u64, AppError> {
        let result = sqlx::query(DELETE_FAILED_CHANGES)
            .bind(id)
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }

    async fn queue_counts(&self) -> Result<QueueCounts, AppError> {
        let rows = sqlx::query(COUNT_CHANGES_BY_STATUS)
            .fetch_all(self.pool.get_pool())
            .await?;

        let mut counts = QueueCounts::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("count")?;
            match status.parse::<QueueStatus>() {
                Ok(QueueStatus::Pending) => counts.pending = count,
                Ok(QueueStatus::Failed) => counts.failed = count,
                Err(_) => {
                    tracing::warn!(status = %status, count, "unknown queue status in store");
                }
            }
        }
        Ok(counts)
    }
}
