use super::queries::{
    DELETE_DRAFT, DELETE_DRAFTS_BEFORE, SELECT_DRAFT, SELECT_SETTING, UPSERT_DRAFT, UPSERT_SETTING,
};
use super::{SqliteLocalStore, millis_to_datetime};
use crate::application::ports::local_store::{DraftStore, SettingsStore};
use crate::domain::entities::WizardDraft;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;

#[derive(Debug, FromRow)]
struct DraftRow {
    wizard_type: String,
    step: i64,
    data: String,
    timestamp: i64,
}

impl DraftRow {
    fn into_domain(self) -> Result<WizardDraft, AppError> {
        Ok(WizardDraft {
            wizard_type: self.wizard_type,
            step: u32::try_from(self.step).unwrap_or(0),
            data: serde_json::from_str(&self.data)?,
            timestamp: millis_to_datetime(self.timestamp)?,
        })
    }
}

#[async_trait]
impl DraftStore for SqliteLocalStore {
    async fn save_draft(&self, draft: &WizardDraft) -> Result<(), AppError> {
        sqlx::query(UPSERT_DRAFT)
            .bind(&draft.wizard_type)
            .bind(i64::from(draft.step))
            .bind(serde_json::to_string(&draft.data)?)
            .bind(draft.timestamp.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn get_draft(&self, wizard_type: &str) -> Result<Option<WizardDraft>, AppError> {
        let row = sqlx::query_as::<_, DraftRow>(SELECT_DRAFT)
            .bind(wizard_type)
            .fetch_optional(self.pool.get_pool())
            .await?;
        row.map(DraftRow::into_domain).transpose()
    }

    async fn delete_draft(&self, wizard_type: &str) -> Result<bool, AppError> {
        let result = sqlx::query(DELETE_DRAFT)
            .bind(wizard_type)
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn prune_drafts(&self, before: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(DELETE_DRAFTS_BEFORE)
            .bind(before.timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SettingsStore for SqliteLocalStore {
    async fn get_setting(&self, key: &str) -> Result<Option<Value>, AppError> {
        let value = sqlx::query_scalar::<_, String>(SELECT_SETTING)
            .bind(key)
            .fetch_optional(self.pool.get_pool())
            .await?;
        value
            .map(|raw| serde_json::from_str(&raw).map_err(AppError::from))
            .transpose()
    }

    async fn put_setting(&self, key: &str, value: &Value) -> Result<(), AppError> {
        sqlx::query(UPSERT_SETTING)
            .bind(key)
            .bind(serde_json::to_string(value)?)
            .bind(Utc::now().timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }
}
