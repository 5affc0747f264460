mod common;

use common::{FakeServer, orchestrator, sync_config};
use serde_json::json;
use std::sync::Arc;
use stevedore_sync::application::ports::local_store::{
    AlertStore, ChangeQueueStore, LocalStore, RecordStore,
};
use stevedore_sync::application::services::{ChangeTracker, SyncRun};
use stevedore_sync::domain::entities::{CriticalAlert, PushPayload, SyncTrigger};
use stevedore_sync::domain::value_objects::{Collection, RecordKey, Severity};
use stevedore_sync::infrastructure::store::{ConnectionPool, SqliteLocalStore};
use stevedore_sync::infrastructure::worker::Connectivity;
use stevedore_sync::shared::clock::SystemClock;
use tempfile::tempdir;

async fn open(url: &str) -> Arc<SqliteLocalStore> {
    Arc::new(SqliteLocalStore::new(ConnectionPool::open(url, 2).await.unwrap()))
}

#[tokio::test]
async fn queue_and_alerts_survive_a_restart() {
    let dir = tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("offline.db").display());

    let local_key = {
        let store = open(&url).await;
        let (record, _) = ChangeTracker::new(store.clone() as Arc<dyn LocalStore>, Arc::new(SystemClock))
            .create(Collection::Tasks, json!({"title": "Inspect crane 3"}))
            .await
            .unwrap();
        let push = PushPayload {
            id: Some("alert-1".into()),
            title: "Gas leak at berth 7".into(),
            severity: Severity::Critical,
            ..PushPayload::default()
        };
        store
            .save_alert(&CriticalAlert::from_push(&push, chrono::Utc::now()))
            .await
            .unwrap();
        store.close().await;
        record.key
    };

    let store = open(&url).await;
    assert_eq!(store.queued_changes().await.unwrap().len(), 1);
    assert_eq!(store.unacknowledged_count().await.unwrap(), 1);
    assert!(store.get(Collection::Tasks, &local_key).await.unwrap().is_some());

    let server = FakeServer::new();
    let sync = orchestrator(store.clone(), server, Connectivity::new(true), sync_config());
    let run = sync.run_cycle(SyncTrigger::Manual).await.unwrap();
    assert!(matches!(run, SyncRun::Completed(report) if report.succeeded == 1));
    assert!(
        store
            .get(Collection::Tasks, &RecordKey::new("1000").unwrap())
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn last_report_is_visible_to_a_later_process() {
    let dir = tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("offline.db").display());

    {
        let store = open(&url).await;
        let sync = orchestrator(store.clone(), FakeServer::new(), Connectivity::new(true), sync_config());
        sync.run_cycle(SyncTrigger::Manual).await.unwrap();
        store.close().await;
    }

    let store = open(&url).await;
    let sync = orchestrator(store, FakeServer::new(), Connectivity::new(true), sync_config());
    let status = sync.status().await.unwrap();
    let report = status.last_report.unwrap();
    assert_eq!(report.trigger, SyncTrigger::Manual);
    assert!(!report.is_aborted());
}
