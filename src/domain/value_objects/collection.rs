use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Named collections of the local store and the sync targets they map to.
/// Alert rows live in their own table; `CriticalAlerts` is only used to
/// route acknowledgments to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Tasks,
    Users,
    Vessels,
    Berths,
    Teams,
    CargoZones,
    BerthAssignments,
    OperationsUpdates,
    CriticalAlerts,
    MaritimeData,
    Settings,
}

/// Secondary indices that can be declared on a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexName {
    Status,
    AssignedTo,
    VesselId,
    DueDate,
    BerthNumber,
    OperationId,
    TeamId,
}

impl IndexName {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexName::Status => "status",
            IndexName::AssignedTo => "assigned_to",
            IndexName::VesselId => "vessel_id",
            IndexName::DueDate => "due_date",
            IndexName::BerthNumber => "berth_number",
            IndexName::OperationId => "operation_id",
            IndexName::TeamId => "team_id",
        }
    }

    /// JSON field the index value is read from.
    pub fn field(&self) -> &'static str {
        self.as_str()
    }
}

impl Collection {
    pub const ALL: [Collection; 11] = [
        Collection::Tasks,
        Collection::Users,
        Collection::Vessels,
        Collection::Berths,
        Collection::Teams,
        Collection::CargoZones,
        Collection::BerthAssignments,
        Collection::OperationsUpdates,
        Collection::CriticalAlerts,
        Collection::MaritimeData,
        Collection::Settings,
    ];

    /// Collections refreshed wholesale from the server after each drain.
    pub const REFERENCE: [Collection; 4] = [
        Collection::Berths,
        Collection::Teams,
        Collection::CargoZones,
        Collection::Vessels,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Tasks => "tasks",
            Collection::Users => "users",
            Collection::Vessels => "vessels",
            Collection::Berths => "berths",
            Collection::Teams => "teams",
            Collection::CargoZones => "cargo_zones",
            Collection::BerthAssignments => "berth_assignments",
            Collection::OperationsUpdates => "operations_updates",
            Collection::CriticalAlerts => "critical_alerts",
            Collection::MaritimeData => "maritime_data",
            Collection::Settings => "settings",
        }
    }

    pub fn indices(&self) -> &'static [IndexName] {
        match self {
            Collection::Tasks => &[
                IndexName::Status,
                IndexName::AssignedTo,
                IndexName::VesselId,
                IndexName::DueDate,
            ],
            Collection::Users => &[IndexName::TeamId],
            Collection::Vessels => &[IndexName::Status, IndexName::BerthNumber],
            Collection::Berths => &[IndexName::Status, IndexName::VesselId],
            Collection::Teams => &[IndexName::Status],
            Collection::CargoZones => &[IndexName::Status],
            Collection::BerthAssignments => &[IndexName::BerthNumber, IndexName::VesselId],
            Collection::OperationsUpdates => &[IndexName::OperationId, IndexName::Status],
            Collection::CriticalAlerts => &[],
            Collection::MaritimeData => &[],
            Collection::Settings => &[],
        }
    }

    pub fn has_index(&self, index: IndexName) -> bool {
        self.indices().contains(&index)
    }

    /// REST resource path on the server. `None` for local-only collections.
    pub fn endpoint(&self) -> Option<&'static str> {
        match self {
            Collection::Tasks => Some("/api/tasks"),
            Collection::Users => Some("/api/users"),
            Collection::Vessels => Some("/api/vessels"),
            Collection::Berths => Some("/api/berths"),
            Collection::Teams => Some("/api/teams"),
            Collection::CargoZones => Some("/api/cargo-zones"),
            Collection::BerthAssignments => Some("/api/berth-assignments"),
            Collection::OperationsUpdates => Some("/api/operations"),
            Collection::CriticalAlerts => Some("/api/alerts"),
            Collection::MaritimeData => Some("/api/maritime"),
            Collection::Settings => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Collection::ALL
            .iter()
            .copied()
            .find(|collection| collection.as_str() == value)
            .ok_or_else(|| format!("Unknown collection: {value}"))
    }
}
