use crate::domain::entities::{CriticalAlert, SyncReport};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Syncing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    Started { trigger: crate::domain::entities::SyncTrigger },
    ChangeSynced { change_id: i64, server_id: Option<String> },
    ChangeFailed { change_id: i64, error: String, frozen: bool },
    Reconciled { collection: String, local_key: String, server_key: String },
    Completed(SyncReport),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertEvent {
    Received(CriticalAlert),
    Acknowledged { id: String, delivered: bool },
    BadgeChanged { count: u64 },
}
