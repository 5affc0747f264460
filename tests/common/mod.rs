#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use stevedore_sync::application::events::{AlertEvent, SyncEvent};
use stevedore_sync::application::ports::fetcher::{FetchRequest, FetchResponse, Fetcher};
use stevedore_sync::application::ports::local_store::LocalStore;
use stevedore_sync::application::ports::notifier::{NotificationSpec, Notifier};
use stevedore_sync::application::ports::server_api::{BatchItemOutcome, ReplayOutcome, ServerApi};
use stevedore_sync::application::services::SyncOrchestrator;
use stevedore_sync::domain::entities::{QueuedChange, acknowledgement_path};
use stevedore_sync::domain::value_objects::{ChangeAction, Collection};
use stevedore_sync::infrastructure::store::{ConnectionPool, SqliteLocalStore};
use stevedore_sync::infrastructure::worker::{Connectivity, EventBus};
use stevedore_sync::shared::config::{AppConfig, SyncConfig};
use stevedore_sync::shared::error::AppError;
use tokio::sync::{Mutex, Notify};

pub async fn memory_store() -> Arc<SqliteLocalStore> {
    let pool = ConnectionPool::from_memory().await.unwrap();
    Arc::new(SqliteLocalStore::new(pool))
}

pub fn sync_config() -> SyncConfig {
    AppConfig::default().sync
}

pub fn orchestrator(
    store: Arc<SqliteLocalStore>,
    server: Arc<FakeServer>,
    connectivity: Connectivity,
    config: SyncConfig,
) -> Arc<SyncOrchestrator> {
    SyncOrchestrator::new(
        store as Arc<dyn LocalStore>,
        server as Arc<dyn ServerApi>,
        connectivity,
        EventBus::<SyncEvent>::default(),
        config,
    )
}

pub fn alert_bus() -> EventBus<AlertEvent> {
    EventBus::default()
}

/// A replay the fake server answered.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayCall {
    pub change_id: i64,
    pub action: ChangeAction,
    pub path: String,
    pub idempotency_key: String,
}

/// In-memory stand-in for the operations server. Replays are deduplicated
/// by idempotency key the way the real endpoint does.
#[derive(Default)]
pub struct FakeServer {
    unhealthy: AtomicBool,
    stalled: AtomicBool,
    entered: Notify,
    release: Notify,
    health_calls: AtomicUsize,
    next_id: AtomicUsize,
    failures: Mutex<VecDeque<AppError>>,
    lose_responses: AtomicUsize,
    applied: Mutex<HashMap<String, ReplayOutcome>>,
    records: Mutex<HashMap<(Collection, String), Value>>,
    calls: Mutex<Vec<ReplayCall>>,
    batches: AtomicUsize,
    collections: Mutex<HashMap<Collection, Vec<Value>>>,
    acknowledged: Mutex<Vec<String>>,
    acknowledge_paths: Mutex<Vec<String>>,
    offline_after: Mutex<Option<(Connectivity, usize)>>,
}

impl FakeServer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicUsize::new(1000),
            ..Self::default()
        })
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    /// Health probes block until [`Self::release`] is called.
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub async fn wait_until_stalled(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.stalled.store(false, Ordering::SeqCst);
        self.release.notify_waiters();
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    /// The next replays fail with these errors, in order.
    pub async fn fail_next(&self, errors: impl IntoIterator<Item = AppError>) {
        self.failures.lock().await.extend(errors);
    }

    /// The next `count` replays are applied but their responses never arrive.
    pub fn lose_responses(&self, count: usize) {
        self.lose_responses.store(count, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<ReplayCall> {
        self.calls.lock().await.clone()
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    pub async fn records_in(&self, collection: Collection) -> Vec<Value> {
        self.records
            .lock()
            .await
            .iter()
            .filter(|((table, _), _)| *table == collection)
            .map(|(_, value)| value.clone())
            .collect()
    }

    pub async fn record(&self, collection: Collection, id: &str) -> Option<Value> {
        self.records
            .lock()
            .await
            .get(&(collection, id.to_string()))
            .cloned()
    }

    pub async fn serve_collection(&self, collection: Collection, items: Vec<Value>) {
        self.collections.lock().await.insert(collection, items);
    }

    pub async fn acknowledged(&self) -> Vec<String> {
        self.acknowledged.lock().await.clone()
    }

    pub async fn acknowledge_paths(&self) -> Vec<String> {
        self.acknowledge_paths.lock().await.clone()
    }

    /// Takes the device offline once `replays` more replays have been answered.
    pub async fn go_offline_after(&self, connectivity: Connectivity, replays: usize) {
        *self.offline_after.lock().await = Some((connectivity, replays));
    }

    async fn count_down_connectivity(&self) {
        let mut offline_after = self.offline_after.lock().await;
        let reached = match offline_after.as_mut() {
            Some((connectivity, left)) => {
                *left = left.saturating_sub(1);
                if *left == 0 {
                    connectivity.set_online(false);
                }
                *left == 0
            }
            None => false,
        };
        if reached {
            *offline_after = None;
        }
    }

    async fn apply(&self, change: &QueuedChange) -> ReplayOutcome {
        let mut records = self.records.lock().await;
        match change.action {
            ChangeAction::Create => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
                let mut body = change.payload.clone();
                if let Some(map) = body.as_object_mut() {
                    map.insert("id".into(), json!(id));
                }
                records.insert((change.table, id.clone()), body.clone());
                ReplayOutcome {
                    server_id: Some(id),
                    body: Some(body),
                }
            }
            ChangeAction::Update => {
                let id = change
                    .record_key
                    .as_ref()
                    .map(|key| key.to_string())
                    .unwrap_or_default();
                records.insert((change.table, id.clone()), change.payload.clone());
                ReplayOutcome {
                    server_id: Some(id),
                    body: Some(change.payload.clone()),
                }
            }
            ChangeAction::Delete => {
                if let Some(key) = change.record_key.as_ref() {
                    records.remove(&(change.table, key.to_string()));
                }
                ReplayOutcome::default()
            }
        }
    }
}

#[async_trait]
impl ServerApi for FakeServer {
    async fn health(&self) -> Result<(), AppError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            let released = self.release.notified();
            self.entered.notify_one();
            released.await;
        }
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(AppError::Network("health probe timed out".into()));
        }
        Ok(())
    }

    async fn replay(&self, change: &QueuedChange) -> Result<ReplayOutcome, AppError> {
        self.calls.lock().await.push(ReplayCall {
            change_id: change.id,
            action: change.action,
            path: change.endpoint_path().unwrap_or_default(),
            idempotency_key: change.idempotency_key.clone(),
        });

        if let Some(err) = self.failures.lock().await.pop_front() {
            return Err(err);
        }

        let existing = self
            .applied
            .lock()
            .await
            .get(&change.idempotency_key)
            .cloned();
        let outcome = match existing {
            Some(outcome) => outcome,
            None => {
                let outcome = self.apply(change).await;
                self.applied
                    .lock()
                    .await
                    .insert(change.idempotency_key.clone(), outcome.clone());
                outcome
            }
        };

        self.count_down_connectivity().await;

        let lost = self
            .lose_responses
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if lost {
            return Err(AppError::Network("connection reset".into()));
        }
        Ok(outcome)
    }

    async fn replay_batch(
        &self,
        changes: &[QueuedChange],
    ) -> Result<Vec<BatchItemOutcome>, AppError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        let mut outcomes = Vec::with_capacity(changes.len());
        for change in changes {
            outcomes.push(BatchItemOutcome {
                change_id: change.id,
                result: self.replay(change).await,
            });
        }
        Ok(outcomes)
    }

    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<Value>, AppError> {
        Ok(self
            .collections
            .lock()
            .await
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn acknowledge_alert(
        &self,
        alert_id: &str,
        _acknowledged_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(AppError::Network("server unreachable".into()));
        }
        self.acknowledged.lock().await.push(alert_id.to_string());
        self.acknowledge_paths
            .lock()
            .await
            .push(acknowledgement_path(alert_id));
        Ok(())
    }
}

/// Scripted network for the cache router.
#[derive(Default)]
pub struct FakeFetcher {
    offline: AtomicBool,
    responses: Mutex<HashMap<String, FetchResponse>>,
    hits: Mutex<HashMap<String, usize>>,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn respond_json(&self, url: &str, body: Value) {
        self.respond(url, 200, "application/json", body.to_string()).await;
    }

    pub async fn respond(&self, url: &str, status: u16, content_type: &str, body: impl Into<Bytes>) {
        self.responses.lock().await.insert(
            url.to_string(),
            FetchResponse {
                status,
                content_type: Some(content_type.to_string()),
                body: body.into(),
                opaque: false,
            },
        );
    }

    pub async fn hits(&self, url: &str) -> usize {
        self.hits.lock().await.get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, AppError> {
        let url = request.url.to_string();
        *self.hits.lock().await.entry(url.clone()).or_default() += 1;
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::Network("failed to fetch".into()));
        }
        Ok(self
            .responses
            .lock()
            .await
            .get(&url)
            .cloned()
            .unwrap_or(FetchResponse {
                status: 404,
                content_type: None,
                body: Bytes::new(),
                opaque: false,
            }))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<NotificationSpec>>,
    badges: Mutex<Vec<u64>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn shown(&self) -> Vec<NotificationSpec> {
        self.shown.lock().await.clone()
    }

    pub async fn last_badge(&self) -> Option<u64> {
        self.badges.lock().await.last().copied()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, notification: &NotificationSpec) -> Result<(), AppError> {
        self.shown.lock().await.push(notification.clone());
        Ok(())
    }

    async fn set_badge(&self, count: u64) -> Result<(), AppError> {
        self.badges.lock().await.push(count);
        Ok(())
    }
}
