mod common;

use common::{FakeFetcher, FakeServer, memory_store, orchestrator, sync_config};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use stevedore_sync::application::events::SyncEvent;
use stevedore_sync::application::ports::fetcher::Fetcher;
use stevedore_sync::application::ports::local_store::{LocalStore, ResponseCacheStore};
use stevedore_sync::application::services::{CacheRouter, ChangeTracker, SyncRun};
use stevedore_sync::domain::entities::{CachedResponse, SyncTrigger};
use stevedore_sync::domain::value_objects::{Collection, SyncTag};
use stevedore_sync::infrastructure::worker::{CacheWorker, Connectivity, SyncScheduler};
use stevedore_sync::shared::clock::{ManualClock, SystemClock};
use stevedore_sync::shared::config::AppConfig;
use url::Url;

#[tokio::test]
async fn control_channel_answers_every_message() {
    let store = memory_store().await;
    let fetcher = FakeFetcher::new();
    store
        .put_cached(CachedResponse::new(
            "GET http://ops.example/".into(),
            "static-v0".into(),
            bytes::Bytes::from_static(b"<html></html>"),
            Some("text/html".into()),
            200,
            0,
            None,
            false,
        ))
        .await
        .unwrap();
    fetcher
        .respond("http://ops.example/index.html", 200, "text/html", "<html>v1</html>")
        .await;

    let router = CacheRouter::new(
        store.clone() as Arc<dyn ResponseCacheStore>,
        fetcher as Arc<dyn Fetcher>,
        ManualClock::new(1_000),
        AppConfig::default().cache,
    );
    let (worker, task) = CacheWorker::new(router).spawn();

    let version = worker.version().await.unwrap();
    assert_eq!(version.version, "v1");
    assert!(!version.active);

    assert_eq!(worker.skip_waiting().await.unwrap(), vec!["static-v0".to_string()]);
    assert!(worker.version().await.unwrap().active);

    let cached = worker
        .cache_urls(vec![Url::parse("http://ops.example/index.html").unwrap()])
        .await
        .unwrap();
    assert_eq!(cached, 1);
    assert_eq!(store.cache_names().await.unwrap(), vec!["static-v1".to_string()]);

    assert_eq!(worker.clear_cache("static-v1").await.unwrap(), 1);
    assert_eq!(store.cached_count().await.unwrap(), 0);

    drop(worker);
    task.await.unwrap();
}

#[tokio::test]
async fn scheduler_syncs_when_connectivity_returns() {
    let store = memory_store().await;
    let server = FakeServer::new();
    let connectivity = Connectivity::new(false);
    let mut config = sync_config();
    config.auto_sync = false;
    let sync = orchestrator(store.clone(), server.clone(), connectivity.clone(), config);
    ChangeTracker::new(store.clone() as Arc<dyn LocalStore>, Arc::new(SystemClock))
        .create(Collection::Tasks, json!({"title": "Inspect crane 3"}))
        .await
        .unwrap();

    let mut events = sync.events().subscribe();
    let scheduler = SyncScheduler::new(Arc::clone(&sync)).spawn();
    connectivity.set_online(true);

    let report = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(SyncEvent::Completed(report)) = events.recv().await {
                return report;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(report.trigger, SyncTrigger::ConnectivityRegained);
    assert_eq!(report.succeeded, 1);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn scheduler_runs_manual_and_tag_requests() {
    let store = memory_store().await;
    let server = FakeServer::new();
    let mut config = sync_config();
    config.auto_sync = false;
    let sync = orchestrator(store.clone(), server.clone(), Connectivity::new(true), config);
    let scheduler = SyncScheduler::new(Arc::clone(&sync)).spawn();

    match scheduler.sync_now().await.unwrap() {
        SyncRun::Completed(report) => assert_eq!(report.trigger, SyncTrigger::Manual),
        SyncRun::AlreadyRunning => panic!("nothing else was running"),
    }
    match scheduler.sync_tag(SyncTag::Weather).await.unwrap() {
        SyncRun::Completed(report) => {
            assert_eq!(report.trigger, SyncTrigger::Tag(SyncTag::Weather));
        }
        SyncRun::AlreadyRunning => panic!("nothing else was running"),
    }
    assert_eq!(server.health_calls(), 2);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn periodic_timer_drives_cycles() {
    let store = memory_store().await;
    let server = FakeServer::new();
    let mut config = sync_config();
    config.sync_interval = 1;
    let sync = orchestrator(store, server.clone(), Connectivity::new(true), config);
    let mut events = sync.events().subscribe();
    let scheduler = SyncScheduler::new(Arc::clone(&sync)).spawn();

    let report = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(SyncEvent::Completed(report)) = events.recv().await {
                return report;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(report.trigger, SyncTrigger::Periodic);

    scheduler.shutdown().await;
}
