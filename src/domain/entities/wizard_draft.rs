use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Partially filled wizard form, one per wizard type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WizardDraft {
    pub wizard_type: String,
    pub step: u32,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl WizardDraft {
    pub fn new(wizard_type: impl Into<String>, step: u32, data: Value) -> Result<Self, String> {
        let wizard_type = wizard_type.into();
        if wizard_type.trim().is_empty() {
            return Err("Wizard type cannot be empty".to_string());
        }
        Ok(Self {
            wizard_type,
            step,
            data,
            timestamp: Utc::now(),
        })
    }

    pub fn is_older_than(&self, now: DateTime<Utc>, days: i64) -> bool {
        now - self.timestamp > Duration::days(days)
    }
}
