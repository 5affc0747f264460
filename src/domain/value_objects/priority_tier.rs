use serde::{Deserialize, Serialize};
use std::fmt;

/// Cache priority class. Decides the TTL a cached response is stored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Critical,
    High,
    General,
    Static,
}

impl PriorityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityTier::Critical => "critical",
            PriorityTier::High => "high",
            PriorityTier::General => "general",
            PriorityTier::Static => "static",
        }
    }

    pub fn is_critical(&self) -> bool {
        matches!(self, PriorityTier::Critical)
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
    CriticalNetworkFirst,
}

impl FetchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStrategy::CacheFirst => "cache_first",
            FetchStrategy::NetworkFirst => "network_first",
            FetchStrategy::StaleWhileRevalidate => "stale_while_revalidate",
            FetchStrategy::CriticalNetworkFirst => "critical_network_first",
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
