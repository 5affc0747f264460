use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    #[default]
    Normal,
    High,
    Urgent,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Normal => "normal",
            Severity::High => "high",
            Severity::Urgent => "urgent",
            Severity::Critical => "critical",
        }
    }

    /// Alerts at these levels are persisted regardless of network state.
    pub fn is_critical_lane(&self) -> bool {
        matches!(self, Severity::Critical | Severity::Urgent)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "normal" => Ok(Severity::Normal),
            "high" => Ok(Severity::High),
            "urgent" => Ok(Severity::Urgent),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("Unknown severity: {other}")),
        }
    }
}

/// Push notification kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    SafetyAlert,
    SafetyIncident,
    BerthUpdate,
    VesselArrival,
    VesselDeparture,
    OperationUpdate,
    WeatherWarning,
    EquipmentFailure,
    /// Any kind this build does not know about yet.
    #[default]
    #[serde(other)]
    General,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::SafetyAlert => "safety_alert",
            AlertKind::SafetyIncident => "safety_incident",
            AlertKind::BerthUpdate => "berth_update",
            AlertKind::VesselArrival => "vessel_arrival",
            AlertKind::VesselDeparture => "vessel_departure",
            AlertKind::OperationUpdate => "operation_update",
            AlertKind::WeatherWarning => "weather_warning",
            AlertKind::EquipmentFailure => "equipment_failure",
            AlertKind::General => "general",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AlertKind {
    type Err = String;

    /// Unknown kinds map to `General`, matching deserialization.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "safety_alert" => AlertKind::SafetyAlert,
            "safety_incident" => AlertKind::SafetyIncident,
            "berth_update" => AlertKind::BerthUpdate,
            "vessel_arrival" => AlertKind::VesselArrival,
            "vessel_departure" => AlertKind::VesselDeparture,
            "operation_update" => AlertKind::OperationUpdate,
            "weather_warning" => AlertKind::WeatherWarning,
            "equipment_failure" => AlertKind::EquipmentFailure,
            _ => AlertKind::General,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_critical_and_urgent_use_the_critical_lane() {
        assert!(Severity::Critical.is_critical_lane());
        assert!(Severity::Urgent.is_critical_lane());
        assert!(!Severity::High.is_critical_lane());
        assert!(!Severity::Info.is_critical_lane());
    }

    #[test]
    fn unknown_kind_deserializes_as_general() {
        let kind: AlertKind = serde_json::from_str("\"tide_table\"").unwrap();
        assert_eq!(kind, AlertKind::General);
        let kind: AlertKind = serde_json::from_str("\"berth_update\"").unwrap();
        assert_eq!(kind, AlertKind::BerthUpdate);
    }
}
