use crate::domain::value_objects::{IndexName, LocalId, RecordKey};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Local mirror of a server entity (task, vessel, berth, ...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OfflineRecord {
    pub key: RecordKey,
    pub data: Value,
    pub is_synced: bool,
    pub local_id: Option<LocalId>,
    pub offline_created: bool,
    pub updated_at: DateTime<Utc>,
}

impl OfflineRecord {
    /// Record as last confirmed by the server.
    pub fn synced(key: RecordKey, data: Value) -> Self {
        let updated_at = updated_at_of(&data).unwrap_or_else(Utc::now);
        Self {
            key,
            data,
            is_synced: true,
            local_id: None,
            offline_created: false,
            updated_at,
        }
    }

    /// Builds a synced record from a server payload, keyed by its `id`.
    pub fn from_server(data: Value) -> Result<Self, String> {
        let key = id_of(&data).ok_or_else(|| "Server record has no id".to_string())?;
        Ok(Self::synced(RecordKey::new(key)?, data))
    }

    /// Record created on this client. It is keyed `local_<local_id>` until
    /// the server assigns an id.
    pub fn new_local(mut data: Value, now: DateTime<Utc>) -> Result<Self, String> {
        let local_id = LocalId::generate();
        let key = RecordKey::for_local(&local_id);
        let map = data
            .as_object_mut()
            .ok_or_else(|| "Record payload must be a JSON object".to_string())?;
        map.insert("id".into(), Value::String(key.to_string()));
        map.insert("local_id".into(), Value::String(local_id.to_string()));
        map.insert("updated_at".into(), Value::String(now.to_rfc3339()));

        Ok(Self {
            key,
            data,
            is_synced: false,
            local_id: Some(local_id),
            offline_created: true,
            updated_at: now,
        })
    }

    /// Applies a local edit; the record stays dirty until the server confirms it.
    pub fn apply_local_edit(&mut self, patch: &Value, now: DateTime<Utc>) {
        if let (Some(target), Some(source)) = (self.data.as_object_mut(), patch.as_object()) {
            for (field, value) in source {
                if field != "id" {
                    target.insert(field.clone(), value.clone());
                }
            }
            target.insert("updated_at".into(), Value::String(now.to_rfc3339()));
        }
        self.is_synced = false;
        self.updated_at = now;
    }

    /// The record after the server has accepted it under `server_id`.
    pub fn reconciled(&self, server_id: &str, server_data: Option<&Value>) -> Result<Self, String> {
        let key = RecordKey::new(server_id)?;
        let mut data = match server_data {
            Some(value) if value.is_object() => value.clone(),
            _ => self.data.clone(),
        };
        if let Some(map) = data.as_object_mut() {
            map.insert("id".into(), Value::String(server_id.to_string()));
        }
        let updated_at = updated_at_of(&data).unwrap_or(self.updated_at);

        Ok(Self {
            key,
            data,
            is_synced: true,
            local_id: self.local_id.clone(),
            offline_created: self.offline_created,
            updated_at,
        })
    }

    /// Stringified value for a secondary index, if the field is present.
    pub fn index_value(&self, index: IndexName) -> Option<String> {
        match self.data.get(index.field())? {
            Value::Null => None,
            Value::String(value) => Some(value.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Reads `id` from a payload, accepting numeric ids.
pub fn id_of(data: &Value) -> Option<String> {
    match data.get("id")? {
        Value::String(value) if !value.trim().is_empty() => Some(value.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Reads `updated_at` (or `updatedAt`) as RFC 3339 text or epoch millis.
pub fn updated_at_of(data: &Value) -> Option<DateTime<Utc>> {
    let raw = data.get("updated_at").or_else(|| data.get("updatedAt"))?;
    match raw {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|value| value.with_timezone(&Utc)),
        Value::Number(number) => number
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_local_record_carries_local_identity() {
        let now = Utc::now();
        let record = OfflineRecord::new_local(json!({"title": "Inspect crane 3"}), now).unwrap();

        let local_id = record.local_id.clone().unwrap();
        assert_eq!(record.key.as_str(), format!("local_{local_id}"));
        assert_eq!(record.data["id"], json!(record.key.as_str()));
        assert!(record.offline_created);
        assert!(!record.is_synced);
    }

    #[test]
    fn reconciled_record_takes_server_id() {
        let record = OfflineRecord::new_local(json!({"title": "Lash cargo"}), Utc::now()).unwrap();
        let reconciled = record.reconciled("981", None).unwrap();

        assert_eq!(reconciled.key.as_str(), "981");
        assert_eq!(reconciled.data["id"], json!("981"));
        assert_eq!(reconciled.data["title"], json!("Lash cargo"));
        assert!(reconciled.is_synced);
    }

    #[test]
    fn index_values_are_stringified() {
        let record = OfflineRecord::from_server(json!({
            "id": 7,
            "status": "open",
            "vessel_id": 12,
            "assigned_to": null
        }))
        .unwrap();

        assert_eq!(record.key.as_str(), "7");
        assert_eq!(record.index_value(IndexName::Status).as_deref(), Some("open"));
        assert_eq!(record.index_value(IndexName::VesselId).as_deref(), Some("12"));
        assert_eq!(record.index_value(IndexName::AssignedTo), None);
    }

    #[test]
    fn updated_at_accepts_text_and_millis() {
        let text = json!({"updated_at": "2024-05-01T10:00:00Z"});
        let millis = json!({"updatedAt": 1_714_557_600_000_i64});
        assert_eq!(updated_at_of(&text), updated_at_of(&millis));
    }
}
