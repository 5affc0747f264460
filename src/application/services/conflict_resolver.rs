use crate::domain::entities::OfflineRecord;
use crate::domain::entities::offline_record::updated_at_of;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeepLocal,
    TakeServer,
}

/// Result of merging a server snapshot of one collection.
#[derive(Debug, Default)]
pub struct MergePlan {
    /// Server records to import as synced.
    pub accepted: Vec<OfflineRecord>,
    /// Keys of dirty local records that won against the server copy.
    pub kept_local: Vec<String>,
    /// Server items without a usable id.
    pub skipped: usize,
}

/// Last-write-wins on `updated_at`, compared on client clocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConflictResolver;

impl ConflictResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, local: Option<&OfflineRecord>, server: &OfflineRecord) -> Resolution {
        let Some(local) = local else {
            return Resolution::TakeServer;
        };
        if local.is_synced {
            return Resolution::TakeServer;
        }

        let Some(local_at) = updated_at_of(&local.data) else {
            return Resolution::TakeServer;
        };
        match updated_at_of(&server.data) {
            Some(server_at) if local_at > server_at => Resolution::KeepLocal,
            Some(_) => Resolution::TakeServer,
            // A dirty edit with no server time to compare against is kept.
            None => Resolution::KeepLocal,
        }
    }

    /// Decides, item by item, which server records replace local state.
    pub fn plan<F>(&self, server_items: Vec<Value>, mut local_lookup: F) -> MergePlan
    where
        F: FnMut(&OfflineRecord) -> Option<OfflineRecord>,
    {
        let mut plan = MergePlan::default();
        for item in server_items {
            let server = match OfflineRecord::from_server(item) {
                Ok(record) => record,
                Err(reason) => {
                    tracing::debug!(reason = %reason, "skipping server item");
                    plan.skipped += 1;
                    continue;
                }
            };
            let local = local_lookup(&server);
            match self.resolve(local.as_ref(), &server) {
                Resolution::TakeServer => plan.accepted.push(server),
                Resolution::KeepLocal => plan.kept_local.push(server.key.to_string()),
            }
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server(updated_at: &str) -> OfflineRecord {
        OfflineRecord::from_server(json!({"id": "4", "status": "occupied", "updated_at": updated_at}))
            .unwrap()
    }

    fn dirty_local(updated_at: Option<&str>) -> OfflineRecord {
        let mut data = json!({"id": "4", "status": "free"});
        if let Some(at) = updated_at {
            data["updated_at"] = json!(at);
        }
        let mut record = OfflineRecord::from_server(data).unwrap();
        record.is_synced = false;
        record
    }

    #[test]
    fn strictly_newer_local_edit_wins() {
        let resolver = ConflictResolver::new();
        let local = dirty_local(Some("2024-05-01T10:05:00Z"));
        assert_eq!(
            resolver.resolve(Some(&local), &server("2024-05-01T10:00:00Z")),
            Resolution::KeepLocal
        );
    }

    #[test]
    fn ties_and_missing_local_time_go_to_server() {
        let resolver = ConflictResolver::new();
        let tie = dirty_local(Some("2024-05-01T10:00:00Z"));
        assert_eq!(
            resolver.resolve(Some(&tie), &server("2024-05-01T10:00:00Z")),
            Resolution::TakeServer
        );
        let untimed = dirty_local(None);
        assert_eq!(
            resolver.resolve(Some(&untimed), &server("2024-05-01T10:00:00Z")),
            Resolution::TakeServer
        );
    }

    #[test]
    fn clean_local_always_yields() {
        let resolver = ConflictResolver::new();
        let mut clean = dirty_local(Some("2030-01-01T00:00:00Z"));
        clean.is_synced = true;
        assert_eq!(
            resolver.resolve(Some(&clean), &server("2024-05-01T10:00:00Z")),
            Resolution::TakeServer
        );
        assert_eq!(
            resolver.resolve(None, &server("2024-05-01T10:00:00Z")),
            Resolution::TakeServer
        );
    }

    #[test]
    fn plan_splits_accepted_and_kept() {
        let resolver = ConflictResolver::new();
        let local = dirty_local(Some("2030-01-01T00:00:00Z"));
        let plan = resolver.plan(
            vec![
                json!({"id": "4", "updated_at": "2024-05-01T10:00:00Z"}),
                json!({"id": "5", "updated_at": "2024-05-01T10:00:00Z"}),
                json!({"name": "no id"}),
            ],
            |server| (server.key.as_str() == "4").then(|| local.clone()),
        );

        assert_eq!(plan.accepted.len(), 1);
        assert_eq!(plan.accepted[0].key.as_str(), "5");
        assert_eq!(plan.kept_local, vec!["4".to_string()]);
        assert_eq!(plan.skipped, 1);
    }
}
