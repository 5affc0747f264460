use crate::domain::entities::offline_record::id_of;
use crate::domain::value_objects::{
    ChangeAction, Collection, LocalId, QueueStatus, RecordKey, SyncTag,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A local mutation awaiting delivery to the server. Queue order is `id` order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedChange {
    pub id: i64,
    pub idempotency_key: String,
    pub tag: SyncTag,
    pub table: Collection,
    pub action: ChangeAction,
    pub record_key: Option<RecordKey>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub status: QueueStatus,
    pub local_id: Option<LocalId>,
    pub server_id: Option<String>,
    pub last_error: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Route that records an alert acknowledgement on the server.
pub fn acknowledgement_path(alert_id: &str) -> String {
    format!("/api/alerts/{alert_id}/acknowledge")
}

impl QueuedChange {
    /// Server path the change is replayed against.
    pub fn endpoint_path(&self) -> Result<String, String> {
        if let Some((alert_id, _)) = self.acknowledgement() {
            return Ok(acknowledgement_path(&alert_id));
        }
        let base = self
            .table
            .endpoint()
            .ok_or_else(|| format!("Collection {} is not synced", self.table))?;

        match self.action {
            ChangeAction::Create => Ok(base.to_string()),
            ChangeAction::Update | ChangeAction::Delete => {
                let key = self.record_key.as_ref().ok_or_else(|| {
                    format!("{} change {} has no record key", self.action, self.id)
                })?;
                Ok(format!("{base}/{}", key.as_str()))
            }
        }
    }

    /// Alert id and time when this change is a queued acknowledgement.
    pub fn acknowledgement(&self) -> Option<(String, DateTime<Utc>)> {
        if self.table != Collection::CriticalAlerts
            || self.payload.get("acknowledged").and_then(Value::as_bool) != Some(true)
        {
            return None;
        }
        let alert_id = self.record_key.as_ref()?.to_string();
        let at = self
            .payload
            .get("acknowledged_at")
            .cloned()
            .and_then(|raw| serde_json::from_value::<DateTime<Utc>>(raw).ok())?;
        Some((alert_id, at))
    }

    /// Identity used to keep changes of the same record in order.
    pub fn ordering_key(&self) -> Option<(Collection, RecordKey)> {
        self.record_key.clone().map(|key| (self.table, key))
    }

    pub fn is_frozen(&self) -> bool {
        self.status == QueueStatus::Failed
    }
}

/// A change about to be enqueued.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueuedChangeDraft {
    pub tag: SyncTag,
    pub table: Collection,
    pub action: ChangeAction,
    pub record_key: Option<RecordKey>,
    pub payload: Value,
    pub local_id: Option<LocalId>,
}

impl QueuedChangeDraft {
    /// Derives the tag from the collection and the record key from `payload.id`.
    pub fn new(table: Collection, action: ChangeAction, payload: Value) -> Self {
        let record_key = id_of(&payload).and_then(|id| RecordKey::new(id).ok());
        let local_id = payload
            .get("local_id")
            .and_then(Value::as_str)
            .and_then(|value| LocalId::new(value).ok());

        Self {
            tag: SyncTag::for_collection(table),
            table,
            action,
            record_key,
            payload,
            local_id,
        }
    }

    pub fn with_tag(mut self, tag: SyncTag) -> Self {
        self.tag = tag;
        self
    }

    pub fn with_record_key(mut self, key: RecordKey) -> Self {
        self.record_key = Some(key);
        self
    }

    pub fn with_local_id(mut self, local_id: LocalId) -> Self {
        self.local_id = Some(local_id);
        self
    }
}
