use crate::application::ports::local_store::{LocalStore, StoreOp};
use crate::domain::entities::{OfflineRecord, QueuedChange, QueuedChangeDraft, WizardDraft};
use crate::domain::value_objects::{ChangeAction, Collection, RecordKey};
use crate::shared::clock::Clock;
use crate::shared::error::AppError;
use serde_json::{Value, json};
use std::sync::Arc;

/// Entry point for local edits. Each edit writes the speculative record and
/// queues its change in one transaction.
pub struct ChangeTracker {
    store: Arc<dyn LocalStore>,
    clock: Arc<dyn Clock>,
}

impl ChangeTracker {
    pub fn new(store: Arc<dyn LocalStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    #[tracing::instrument(skip(self, data))]
    pub async fn create(
        &self,
        collection: Collection,
        data: Value,
    ) -> Result<(OfflineRecord, QueuedChange), AppError> {
        let record =
            OfflineRecord::new_local(data, self.clock.now()).map_err(AppError::ValidationError)?;
        let mut draft =
            QueuedChangeDraft::new(collection, ChangeAction::Create, record.data.clone())
                .with_record_key(record.key.clone());
        if let Some(local_id) = record.local_id.clone() {
            draft = draft.with_local_id(local_id);
        }

        let change = self
            .commit(vec![
                StoreOp::Put {
                    collection,
                    record: record.clone(),
                },
                StoreOp::Enqueue(draft),
            ])
            .await?;
        tracing::debug!(key = %record.key, change_id = change.id, "record created offline");
        Ok((record, change))
    }

    #[tracing::instrument(skip(self, patch))]
    pub async fn update(
        &self,
        collection: Collection,
        key: &RecordKey,
        patch: Value,
    ) -> Result<(OfflineRecord, QueuedChange), AppError> {
        let mut record = self
            .store
            .get(collection, key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{collection}/{key} not found")))?;
        record.apply_local_edit(&patch, self.clock.now());

        let mut draft = QueuedChangeDraft::new(collection, ChangeAction::Update, record.data.clone())
            .with_record_key(record.key.clone());
        if let Some(local_id) = record.local_id.clone() {
            draft = draft.with_local_id(local_id);
        }

        let change = self
            .commit(vec![
                StoreOp::Put {
                    collection,
                    record: record.clone(),
                },
                StoreOp::Enqueue(draft),
            ])
            .await?;
        Ok((record, change))
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(
        &self,
        collection: Collection,
        key: &RecordKey,
    ) -> Result<QueuedChange, AppError> {
        let existing = self.store.get(collection, key).await?;
        let mut draft = QueuedChangeDraft::new(
            collection,
            ChangeAction::Delete,
            json!({ "id": key.as_str() }),
        )
        .with_record_key(key.clone());
        if let Some(local_id) = existing.and_then(|record| record.local_id) {
            draft = draft.with_local_id(local_id);
        }

        self.commit(vec![
            StoreOp::Delete {
                collection,
                key: key.clone(),
            },
            StoreOp::Enqueue(draft),
        ])
        .await
    }

    pub async fn save_draft(
        &self,
        wizard_type: &str,
        step: u32,
        data: Value,
    ) -> Result<WizardDraft, AppError> {
        let mut draft =
            WizardDraft::new(wizard_type, step, data).map_err(AppError::ValidationError)?;
        draft.timestamp = self.clock.now();
        self.store.save_draft(&draft).await?;
        Ok(draft)
    }

    pub async fn load_draft(&self, wizard_type: &str) -> Result<Option<WizardDraft>, AppError> {
        self.store.get_draft(wizard_type).await
    }

    /// Turns the saved wizard draft into a create and discards the draft.
    pub async fn submit_draft(
        &self,
        wizard_type: &str,
        collection: Collection,
    ) -> Result<(OfflineRecord, QueuedChange), AppError> {
        let draft = self
            .store
            .get_draft(wizard_type)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No draft for {wizard_type}")))?;
        let created = self.create(collection, draft.data).await?;
        self.store.delete_draft(wizard_type).await?;
        Ok(created)
    }

    pub async fn abandon_draft(&self, wizard_type: &str) -> Result<bool, AppError> {
        self.store.delete_draft(wizard_type).await
    }

    async fn commit(&self, ops: Vec<StoreOp>) -> Result<QueuedChange, AppError> {
        let outcome = self.store.transaction(ops).await?;
        let id = outcome
            .enqueued
            .first()
            .copied()
            .ok_or_else(|| AppError::Internal("transaction queued no change".to_string()))?;
        self.store
            .get_change(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Queued change {id} not found")))
    }
}
