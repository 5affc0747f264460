use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
}

/// What the platform is asked to display for a push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationSpec {
    pub title: String,
    pub body: String,
    pub tag: String,
    pub vibrate: Vec<u32>,
    pub urgency: Urgency,
    pub require_interaction: bool,
    pub renotify: bool,
    pub silent: bool,
    pub actions: Vec<NotificationAction>,
    pub data: Value,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &NotificationSpec) -> Result<(), AppError>;
    async fn set_badge(&self, count: u64) -> Result<(), AppError>;
}
