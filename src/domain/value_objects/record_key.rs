use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

const LOCAL_PREFIX: &str = "local_";

/// Primary key of a record inside its collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        Self::validate(&value)?;
        Ok(Self(value))
    }

    /// Temporary key of a record created on this client.
    pub fn for_local(local_id: &LocalId) -> Self {
        Self(format!("{LOCAL_PREFIX}{}", local_id.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_PREFIX)
    }

    fn validate(value: &str) -> Result<(), String> {
        if value.trim().is_empty() {
            return Err("Record key cannot be empty".to_string());
        }
        Ok(())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<RecordKey> for String {
    fn from(key: RecordKey) -> Self {
        key.0
    }
}

/// Client-generated identity of a record that has not reached the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocalId(String);

impl LocalId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn new(value: impl Into<String>) -> Result<Self, String> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err("Local id cannot be empty".to_string());
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_key_is_prefixed() {
        let local_id = LocalId::new("L").unwrap();
        let key = RecordKey::for_local(&local_id);
        assert_eq!(key.as_str(), "local_L");
        assert!(key.is_local());
        assert!(!RecordKey::new("42").unwrap().is_local());
    }

    #[test]
    fn empty_key_is_rejected() {
        assert!(RecordKey::new("  ").is_err());
        assert!(LocalId::new("").is_err());
    }
}
