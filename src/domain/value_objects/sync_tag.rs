use super::Collection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Background sync registration tag. Each tag names one domain of queued
/// work and triggers the matching orchestrator routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncTag {
    TaskSync,
    BerthAssignment,
    OperationsUpdate,
    CriticalAlert,
    StevedoreAssignment,
    CargoUpdate,
    EquipmentStatus,
    Weather,
    SafetyIncident,
    PerformanceMetrics,
}

impl SyncTag {
    pub const ALL: [SyncTag; 10] = [
        SyncTag::TaskSync,
        SyncTag::BerthAssignment,
        SyncTag::OperationsUpdate,
        SyncTag::CriticalAlert,
        SyncTag::StevedoreAssignment,
        SyncTag::CargoUpdate,
        SyncTag::EquipmentStatus,
        SyncTag::Weather,
        SyncTag::SafetyIncident,
        SyncTag::PerformanceMetrics,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTag::TaskSync => "task-sync",
            SyncTag::BerthAssignment => "berth-assignment",
            SyncTag::OperationsUpdate => "operations-update",
            SyncTag::CriticalAlert => "critical-alert",
            SyncTag::StevedoreAssignment => "stevedore-assignment",
            SyncTag::CargoUpdate => "cargo-update",
            SyncTag::EquipmentStatus => "equipment-status",
            SyncTag::Weather => "weather",
            SyncTag::SafetyIncident => "safety-incident",
            SyncTag::PerformanceMetrics => "performance-metrics",
        }
    }

    /// Default tag for a change that targets `collection`.
    pub fn for_collection(collection: Collection) -> Self {
        match collection {
            Collection::Tasks => SyncTag::TaskSync,
            Collection::Users | Collection::Teams => SyncTag::StevedoreAssignment,
            Collection::BerthAssignments | Collection::Berths => SyncTag::BerthAssignment,
            Collection::OperationsUpdates => SyncTag::OperationsUpdate,
            Collection::CriticalAlerts => SyncTag::CriticalAlert,
            Collection::Vessels | Collection::CargoZones => SyncTag::CargoUpdate,
            Collection::MaritimeData | Collection::Settings => SyncTag::EquipmentStatus,
        }
    }

    /// Reference collections refreshed after the tag's queue slice drains.
    pub fn reference_collections(&self) -> &'static [Collection] {
        match self {
            SyncTag::BerthAssignment => &[Collection::Berths, Collection::Vessels],
            SyncTag::StevedoreAssignment => &[Collection::Teams],
            SyncTag::CargoUpdate => &[Collection::CargoZones, Collection::Vessels],
            SyncTag::Weather => &[Collection::MaritimeData],
            SyncTag::TaskSync
            | SyncTag::OperationsUpdate
            | SyncTag::CriticalAlert
            | SyncTag::EquipmentStatus
            | SyncTag::SafetyIncident
            | SyncTag::PerformanceMetrics => &[],
        }
    }
}

impl fmt::Display for SyncTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncTag {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        SyncTag::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == value)
            .ok_or_else(|| format!("Unknown sync tag: {value}"))
    }
}
