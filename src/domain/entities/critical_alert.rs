use crate::domain::value_objects::{AlertKind, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Incoming push message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PushPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(rename = "type", default)]
    pub kind: AlertKind,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub data: PushData,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct PushData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub berth_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vessel_id: Option<String>,
}

impl PushPayload {
    /// Parses a raw push body. Missing fields fall back to defaults.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// A persisted critical or urgent alert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriticalAlert {
    pub id: String,
    pub kind: AlertKind,
    pub severity: Severity,
    pub title: String,
    pub body: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl CriticalAlert {
    pub fn from_push(push: &PushPayload, now: DateTime<Utc>) -> Self {
        let id = push
            .id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            id,
            kind: push.kind,
            severity: push.severity,
            title: push.title.clone(),
            body: push.body.clone(),
            payload: serde_json::to_value(push).unwrap_or(Value::Null),
            timestamp: now,
            acknowledged: false,
            acknowledged_at: None,
        }
    }

    pub fn acknowledge(&mut self, at: DateTime<Utc>) {
        if !self.acknowledged {
            self.acknowledged = true;
            self.acknowledged_at = Some(at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_push_with_camel_case_data() {
        let push = PushPayload::parse(
            r#"{"title":"Berth 4","body":"Crane fault","type":"equipment_failure",
                "severity":"critical","data":{"berthNumber":"4","vesselId":"v-9"}}"#,
        )
        .unwrap();

        assert_eq!(push.kind, AlertKind::EquipmentFailure);
        assert_eq!(push.severity, Severity::Critical);
        assert_eq!(push.data.berth_number.as_deref(), Some("4"));
        assert_eq!(push.data.vessel_id.as_deref(), Some("v-9"));
        assert_eq!(push.data.operation_id, None);
    }

    #[test]
    fn missing_fields_default() {
        let push = PushPayload::parse(r#"{"title":"Heads up"}"#).unwrap();
        assert_eq!(push.severity, Severity::Normal);
        assert_eq!(push.kind, AlertKind::General);
    }

    #[test]
    fn acknowledge_keeps_first_timestamp() {
        let push = PushPayload {
            title: "Man overboard".into(),
            severity: Severity::Critical,
            ..PushPayload::default()
        };
        let mut alert = CriticalAlert::from_push(&push, Utc::now());
        let first = Utc::now();
        alert.acknowledge(first);
        alert.acknowledge(first + chrono::Duration::seconds(5));

        assert!(alert.acknowledged);
        assert_eq!(alert.acknowledged_at, Some(first));
    }
}
