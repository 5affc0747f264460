use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a cycle stopped before draining its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    ProbeFailed,
    WentOffline,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::ProbeFailed => write!(f, "probe_failed"),
            AbortReason::WentOffline => write!(f, "went_offline"),
        }
    }
}

/// What triggered a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Manual,
    Periodic,
    ConnectivityRegained,
    VisibilityRegained,
    Tag(crate::domain::value_objects::SyncTag),
}

/// Outcome of one sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub trigger: SyncTrigger,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub held: usize,
    pub reference_refreshed: usize,
    pub aborted: Option<AbortReason>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn started(trigger: SyncTrigger) -> Self {
        let now = Utc::now();
        Self {
            trigger,
            processed: 0,
            succeeded: 0,
            failed: 0,
            held: 0,
            reference_refreshed: 0,
            aborted: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    pub fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }
}
