use super::queries::{
    DELETE_INDEX_ENTRIES, DELETE_RECORD, INSERT_INDEX_ENTRY, SELECT_RECORD, SELECT_RECORDS,
    SELECT_RECORDS_BY_INDEX, SELECT_SYNCED_KEYS, UPSERT_RECORD,
};
use super::queue::insert_change;
use super::{SqliteLocalStore, millis_to_datetime};
use crate::application::ports::local_store::{
    RecordStore, SnapshotOutcome, StoreOp, TransactionOutcome,
};
use crate::domain::entities::OfflineRecord;
use crate::domain::value_objects::{Collection, IndexName, LocalId, RecordKey};
use crate::shared::error::AppError;
use async_trait::async_trait;
use sqlx::{FromRow, SqliteConnection};
use std::collections::HashSet;

#[derive(Debug, FromRow)]
struct RecordRow {
    record_key: String,
    data: String,
    is_synced: bool,
    local_id: Option<String>,
    offline_created: bool,
    updated_at: i64,
}

impl RecordRow {
    fn into_domain(self) -> Result<OfflineRecord, AppError> {
        let key = RecordKey::new(self.record_key).map_err(AppError::ValidationError)?;
        let local_id = self
            .local_id
            .map(LocalId::new)
            .transpose()
            .map_err(AppError::ValidationError)?;

        Ok(OfflineRecord {
            key,
            data: serde_json::from_str(&self.data)?,
            is_synced: self.is_synced,
            local_id,
            offline_created: self.offline_created,
            updated_at: millis_to_datetime(self.updated_at)?,
        })
    }
}

/// Writes the record and rebuilds its index entries.
pub(super) async fn write_record(
    conn: &mut SqliteConnection,
    collection: Collection,
    record: &OfflineRecord,
) -> Result<(), AppError> {
    let data = serde_json::to_string(&record.data)?;

    sqlx::query(UPSERT_RECORD)
        .bind(collection.as_str())
        .bind(record.key.as_str())
        .bind(&data)
        .bind(record.is_synced)
        .bind(record.local_id.as_ref().map(|id| id.as_str().to_string()))
        .bind(record.offline_created)
        .bind(record.updated_at.timestamp_millis())
        .execute(&mut *conn)
        .await?;

    sqlx::query(DELETE_INDEX_ENTRIES)
        .bind(collection.as_str())
        .bind(record.key.as_str())
        .execute(&mut *conn)
        .await?;

    for index in collection.indices() {
        if let Some(value) = record.index_value(*index) {
            sqlx::query(INSERT_INDEX_ENTRY)
                .bind(collection.as_str())
                .bind(index.as_str())
                .bind(&value)
                .bind(record.key.as_str())
                .execute(&mut *conn)
                .await?;
        }
    }

    Ok(())
}

pub(super) async fn remove_record(
    conn: &mut SqliteConnection,
    collection: Collection,
    key: &RecordKey,
) -> Result<bool, AppError> {
    sqlx::query(DELETE_INDEX_ENTRIES)
        .bind(collection.as_str())
        .bind(key.as_str())
        .execute(&mut *conn)
        .await?;

    let result = sqlx::query(DELETE_RECORD)
        .bind(collection.as_str())
        .bind(key.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

#[async_trait]
impl RecordStore for SqliteLocalStore {
    async fn put(&self, collection: Collection, record: OfflineRecord) -> Result<(), AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        write_record(&mut tx, collection, &record).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(
        &self,
        collection: Collection,
        key: &RecordKey,
    ) -> Result<Option<OfflineRecord>, AppError> {
        let row = sqlx::query_as::<_, RecordRow>(SELECT_RECORD)
            .bind(collection.as_str())
            .bind(key.as_str())
            .fetch_optional(self.pool.get_pool())
            .await?;

        row.map(RecordRow::into_domain).transpose()
    }

    async fn get_all(&self, collection: Collection) -> Result<Vec<OfflineRecord>, AppError> {
        let rows = sqlx::query_as::<_, RecordRow>(SELECT_RECORDS)
            .bind(collection.as_str())
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(RecordRow::into_domain).collect()
    }

    async fn query_by_index(
        &self,
        collection: Collection,
        index: IndexName,
        value: &str,
    ) -> Result<Vec<OfflineRecord>, AppError> {
        if !collection.has_index(index) {
            return Err(AppError::ValidationError(format!(
                "Collection {collection} has no {} index",
                index.as_str()
            )));
        }

        let rows = sqlx::query_as::<_, RecordRow>(SELECT_RECORDS_BY_INDEX)
            .bind(collection.as_str())
            .bind(index.as_str())
            .bind(value)
            .fetch_all(self.pool.get_pool())
            .await?;

        rows.into_iter().map(RecordRow::into_domain).collect()
    }

    async fn delete(&self, collection: Collection, key: &RecordKey) -> Result<bool, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        let removed = remove_record(&mut tx, collection, key).await?;
        tx.commit().await?;
        Ok(removed)
    }

    async fn bulk_import(
        &self,
        collection: Collection,
        records: Vec<OfflineRecord>,
    ) -> Result<usize, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        let count = records.len();
        for mut record in records {
            record.is_synced = true;
            write_record(&mut tx, collection, &record).await?;
        }
        tx.commit().await?;

        tracing::debug!(collection = %collection, count, "bulk import committed");
        Ok(count)
    }

    async fn import_snapshot(
        &self,
        collection: Collection,
        records: Vec<OfflineRecord>,
    ) -> Result<SnapshotOutcome, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        let listed: HashSet<String> = records
            .iter()
            .map(|record| record.key.as_str().to_string())
            .collect();

        let synced: Vec<String> = sqlx::query_scalar(SELECT_SYNCED_KEYS)
            .bind(collection.as_str())
            .fetch_all(&mut *tx)
            .await?;
        let mut outcome = SnapshotOutcome::default();
        for key in synced {
            if listed.contains(&key) {
                continue;
            }
            let key = RecordKey::new(key).map_err(AppError::ValidationError)?;
            if key.is_local() {
                continue;
            }
            if remove_record(&mut tx, collection, &key).await? {
                outcome.removed += 1;
            }
        }

        for mut record in records {
            record.is_synced = true;
            write_record(&mut tx, collection, &record).await?;
            outcome.imported += 1;
        }
        tx.commit().await?;

        tracing::debug!(
            collection = %collection,
            imported = outcome.imported,
            removed = outcome.removed,
            "reference snapshot committed"
        );
        Ok(outcome)
    }

    async fn transaction(&self, ops: Vec<StoreOp>) -> Result<TransactionOutcome, AppError> {
        let mut tx = self.pool.get_pool().begin().await?;
        let mut outcome = TransactionOutcome::default();

        for op in ops {
            match op {
                StoreOp::Put { collection, record } => {
                    write_record(&mut tx, collection, &record).await?;
                }
                StoreOp::Delete { collection, key } => {
                    remove_record(&mut tx, collection, &key).await?;
                }
                StoreOp::Enqueue(draft) => {
                    let change = insert_change(&mut tx, draft).await?;
                    outcome.enqueued.push(change.id);
                }
            }
        }

        tx.commit().await?;
        Ok(outcome)
    }
}
