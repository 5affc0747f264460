use crate::domain::entities::{
    CachedResponse, CriticalAlert, OfflineRecord, QueuedChange, QueuedChangeDraft, WizardDraft,
};
use crate::domain::value_objects::{Collection, IndexName, RecordKey};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of an all-or-nothing [`RecordStore::transaction`].
#[derive(Debug, Clone)]
pub enum StoreOp {
    Put {
        collection: Collection,
        record: OfflineRecord,
    },
    Delete {
        collection: Collection,
        key: RecordKey,
    },
    Enqueue(QueuedChangeDraft),
}

/// Queue sequence ids assigned to the `Enqueue` ops of a transaction, in op order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub enqueued: Vec<i64>,
}

/// Id rewrite applied when the server accepts a client-created record.
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub collection: Collection,
    pub local_key: RecordKey,
    pub record: OfflineRecord,
}

/// What a reference snapshot did to a collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotOutcome {
    pub imported: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: i64,
    pub failed: i64,
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn put(&self, collection: Collection, record: OfflineRecord) -> Result<(), AppError>;
    async fn get(
        &self,
        collection: Collection,
        key: &RecordKey,
    ) -> Result<Option<OfflineRecord>, AppError>;
    async fn get_all(&self, collection: Collection) -> Result<Vec<OfflineRecord>, AppError>;
    async fn query_by_index(
        &self,
        collection: Collection,
        index: IndexName,
        value: &str,
    ) -> Result<Vec<OfflineRecord>, AppError>;
    async fn delete(&self, collection: Collection, key: &RecordKey) -> Result<bool, AppError>;
    /// Upserts records in one transaction; every imported record is marked synced.
    async fn bulk_import(
        &self,
        collection: Collection,
        records: Vec<OfflineRecord>,
    ) -> Result<usize, AppError>;
    /// Imports a server snapshot as synced and, in the same transaction, drops
    /// synced rows the snapshot no longer lists. Dirty and `local_*` rows stay.
    async fn import_snapshot(
        &self,
        collection: Collection,
        records: Vec<OfflineRecord>,
    ) -> Result<SnapshotOutcome, AppError>;
    async fn transaction(&self, ops: Vec<StoreOp>) -> Result<TransactionOutcome, AppError>;
}

#[async_trait]
pub trait ChangeQueueStore: Send + Sync {
    async fn enqueue(&self, draft: QueuedChangeDraft) -> Result<QueuedChange, AppError>;
    async fn get_change(&self, id: i64) -> Result<Option<QueuedChange>, AppError>;
    /// Pending and failed changes in queue order.
    async fn queued_changes(&self) -> Result<Vec<QueuedChange>, AppError>;
    async fn failed_changes(&self) -> Result<Vec<QueuedChange>, AppError>;
    /// Bumps `retry_count`; the change is frozen as failed when `freeze` is set
    /// or the count reaches `max_retry`.
    async fn record_failure(
        &self,
        id: i64,
        error: &str,
        max_retry: u32,
        freeze: bool,
    ) -> Result<QueuedChange, AppError>;
    /// Removes an acknowledged change, applying the id rewrite in the same transaction.
    async fn complete_change(
        &self,
        id: i64,
        reconciliation: Option<Reconciliation>,
    ) -> Result<(), AppError>;
    /// Moves failed changes back to pending with a fresh retry budget.
    async fn retry_failed(&self, id: Option<i64>) -> Result<u64, AppError>;
    async fn clear_failed(&self, id: Option<i64>) -> Result<u64, AppError>;
    async fn queue_counts(&self) -> Result<QueueCounts, AppError>;
}

#[async_trait]
pub trait ResponseCacheStore: Send + Sync {
    async fn get_cached(
        &self,
        cache_name: &str,
        key: &str,
    ) -> Result<Option<CachedResponse>, AppError>;
    async fn put_cached(&self, entry: CachedResponse) -> Result<(), AppError>;
    async fn cache_names(&self) -> Result<Vec<String>, AppError>;
    async fn delete_cache(&self, cache_name: &str) -> Result<u64, AppError>;
    /// Entries whose `expires` is before `before_ms`.
    async fn sweep_expired(&self, before_ms: i64) -> Result<u64, AppError>;
    async fn cached_count(&self) -> Result<i64, AppError>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Inserts the alert unless one with the same id is already stored.
    async fn save_alert(&self, alert: &CriticalAlert) -> Result<bool, AppError>;
    async fn get_alert(&self, id: &str) -> Result<Option<CriticalAlert>, AppError>;
    async fn list_alerts(&self, include_acknowledged: bool)
    -> Result<Vec<CriticalAlert>, AppError>;
    async fn acknowledge_alert(&self, id: &str, at: DateTime<Utc>) -> Result<bool, AppError>;
    async fn unacknowledged_count(&self) -> Result<i64, AppError>;
    async fn prune_acknowledged(&self, before: DateTime<Utc>) -> Result<u64, AppError>;
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save_draft(&self, draft: &WizardDraft) -> Result<(), AppError>;
    async fn get_draft(&self, wizard_type: &str) -> Result<Option<WizardDraft>, AppError>;
    async fn delete_draft(&self, wizard_type: &str) -> Result<bool, AppError>;
    async fn prune_drafts(&self, before: DateTime<Utc>) -> Result<u64, AppError>;
}

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, key: &str) -> Result<Option<Value>, AppError>;
    async fn put_setting(&self, key: &str, value: &Value) -> Result<(), AppError>;
}

/// Everything the engine persists locally.
pub trait LocalStore:
    RecordStore + ChangeQueueStore + ResponseCacheStore + AlertStore + DraftStore + SettingsStore
{
}

impl<T> LocalStore for T where
    T: RecordStore
        + ChangeQueueStore
        + ResponseCacheStore
        + AlertStore
        + DraftStore
        + SettingsStore
{
}
