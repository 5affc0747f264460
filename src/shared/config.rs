use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub retention: RetentionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub base_url: String,
    pub health_path: String,
    pub batch_path: String,
    /// Per-request timeout; 0 keeps the client default.
    pub request_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub sync_interval: u64,
    pub max_retry: u32,
    pub batch_size: u32,
    pub backoff_base: u64,
    pub backoff_max: u64,
    pub fail_fast_on_rejection: bool,
    pub use_batch_endpoint: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub version: String,
    pub critical_ttl: u64,
    pub high_ttl: u64,
    pub general_ttl: u64,
    pub critical_stale_budget: u64,
    pub memory_entries: usize,
    pub offline_fallback: String,
    pub sweep_grace: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub draft_days: i64,
    pub acknowledged_alert_days: i64,
    pub maintenance_interval: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: default_database_url(),
                max_connections: 5,
            },
            server: ServerConfig {
                base_url: "http://localhost:8000".to_string(),
                health_path: "/api/health".to_string(),
                batch_path: "/api/sync/batch".to_string(),
                request_timeout: 0,
            },
            sync: SyncConfig {
                auto_sync: true,
                sync_interval: 30,
                max_retry: 3,
                batch_size: 25,
                backoff_base: 30,
                backoff_max: 15 * 60,
                fail_fast_on_rejection: true,
                use_batch_endpoint: false,
            },
            cache: CacheConfig {
                version: "v1".to_string(),
                critical_ttl: 2 * 60,
                high_ttl: 5 * 60,
                general_ttl: 30 * 60,
                critical_stale_budget: 2 * 60,
                memory_entries: 256,
                offline_fallback: "/offline.html".to_string(),
                sweep_grace: 24 * 60 * 60,
            },
            retention: RetentionConfig {
                draft_days: 7,
                acknowledged_alert_days: 30,
                maintenance_interval: 60 * 60,
            },
        }
    }
}

fn default_database_url() -> String {
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("./data"))
        .join("stevedore-sync")
        .join("offline.db");
    format!("sqlite://{}?mode=rwc", path.display())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("STEVEDORE_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.database.url = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var("STEVEDORE_SERVER_URL") {
            if !v.trim().is_empty() {
                cfg.server.base_url = v.trim().trim_end_matches('/').to_string();
            }
        }
        if let Some(value) = std::env::var("STEVEDORE_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| parse_u64(&v))
        {
            cfg.server.request_timeout = value;
        }

        if let Ok(v) = std::env::var("STEVEDORE_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Some(value) = std::env::var("STEVEDORE_SYNC_INTERVAL")
            .ok()
            .and_then(|v| parse_u64(&v))
        {
            cfg.sync.sync_interval = value.max(1);
        }
        if let Some(value) = std::env::var("STEVEDORE_MAX_RETRY")
            .ok()
            .and_then(|v| parse_u64(&v))
        {
            cfg.sync.max_retry = value.clamp(1, u32::MAX as u64) as u32;
        }
        if let Some(value) = std::env::var("STEVEDORE_BATCH_SIZE")
            .ok()
            .and_then(|v| parse_u64(&v))
        {
            cfg.sync.batch_size = value.clamp(1, u32::MAX as u64) as u32;
        }
        if let Ok(v) = std::env::var("STEVEDORE_FAIL_FAST_ON_REJECTION") {
            cfg.sync.fail_fast_on_rejection = parse_bool(&v, cfg.sync.fail_fast_on_rejection);
        }
        if let Ok(v) = std::env::var("STEVEDORE_USE_BATCH_ENDPOINT") {
            cfg.sync.use_batch_endpoint = parse_bool(&v, cfg.sync.use_batch_endpoint);
        }

        if let Ok(v) = std::env::var("STEVEDORE_CACHE_VERSION") {
            if !v.trim().is_empty() {
                cfg.cache.version = v.trim().to_string();
            }
        }
        if let Some(value) = std::env::var("STEVEDORE_CRITICAL_TTL")
            .ok()
            .and_then(|v| parse_u64(&v))
        {
            cfg.cache.critical_ttl = value.max(1);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.server.base_url.trim().is_empty() {
            return Err("Server base_url must not be empty".to_string());
        }
        if self.sync.sync_interval == 0 {
            return Err("Sync sync_interval must be greater than 0".to_string());
        }
        if self.sync.max_retry == 0 {
            return Err("Sync max_retry must be greater than 0".to_string());
        }
        if self.sync.batch_size == 0 {
            return Err("Sync batch_size must be greater than 0".to_string());
        }
        if self.sync.backoff_max < self.sync.backoff_base {
            return Err("Sync backoff_max must not be lower than backoff_base".to_string());
        }
        // Critical data must never be served as fresh for longer than two minutes.
        if self.cache.critical_ttl == 0 || self.cache.critical_ttl > 120 {
            return Err("Cache critical_ttl must be within 1..=120 seconds".to_string());
        }
        if self.cache.memory_entries == 0 {
            return Err("Cache memory_entries must be greater than 0".to_string());
        }
        if self.retention.draft_days <= 0 {
            return Err("Retention draft_days must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.sync.max_retry, 3);
        assert_eq!(cfg.cache.critical_ttl, 120);
        assert_eq!(cfg.retention.draft_days, 7);
    }

    #[test]
    fn critical_ttl_above_two_minutes_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.cache.critical_ttl = 300;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parse_bool_falls_back_to_default() {
        assert!(parse_bool("yes", false));
        assert!(!parse_bool("off", true));
        assert!(parse_bool("maybe", true));
    }
}
