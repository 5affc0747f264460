use crate::application::events::{SyncEvent, SyncState};
use crate::application::ports::local_store::{LocalStore, QueueCounts, Reconciliation};
use crate::application::ports::server_api::{ReplayOutcome, ServerApi};
use crate::application::services::conflict_resolver::ConflictResolver;
use crate::domain::entities::{
    AbortReason, OfflineRecord, QueuedChange, SyncReport, SyncTrigger,
};
use crate::domain::value_objects::{ChangeAction, Collection, QueueStatus, RecordKey, SyncTag};
use crate::infrastructure::worker::{Connectivity, EventBus};
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use crate::shared::metrics::{SyncMetrics, SyncMetricsSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, watch};

const LAST_REPORT_SETTING: &str = "sync.last_report";

/// Result of asking for a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncRun {
    Completed(SyncReport),
    AlreadyRunning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub online: bool,
    pub queue: QueueCounts,
    pub consecutive_failures: u32,
    pub next_delay_secs: u64,
    pub last_report: Option<SyncReport>,
    pub metrics: SyncMetricsSnapshot,
}

type OrderingKey = (Collection, RecordKey);

/// Changes picked for this cycle plus how many were held back.
#[derive(Debug, Default)]
struct Selection {
    batch: Vec<QueuedChange>,
    held: usize,
}

/// Picks up to `limit` pending changes in queue order. A record with an
/// earlier failed change is blocked; its later changes are held. In batch
/// mode only the first change of each record is taken.
fn select_changes(
    queued: &[QueuedChange],
    limit: usize,
    tag: Option<SyncTag>,
    one_per_record: bool,
) -> Selection {
    let mut selection = Selection::default();
    let mut blocked: HashSet<OrderingKey> = HashSet::new();
    let mut taken: HashSet<OrderingKey> = HashSet::new();

    for change in queued {
        let key = change.ordering_key();
        if change.status == QueueStatus::Failed {
            if let Some(key) = key {
                blocked.insert(key);
            }
            continue;
        }
        if tag.is_some_and(|tag| tag != change.tag) {
            continue;
        }
        if let Some(key) = key.as_ref() {
            if blocked.contains(key) {
                selection.held += 1;
                continue;
            }
            if one_per_record && taken.contains(key) {
                selection.held += 1;
                continue;
            }
        }
        if selection.batch.len() >= limit {
            break;
        }
        if let Some(key) = key {
            taken.insert(key);
        }
        selection.batch.push(change.clone());
    }

    selection
}

/// Whether later queued changes target the same record. Compared on the
/// keys the changes had when the cycle started.
fn has_followers(change: &QueuedChange, queued: &[QueuedChange]) -> bool {
    change.ordering_key().is_some_and(|key| {
        queued
            .iter()
            .any(|other| other.id > change.id && other.ordering_key().as_ref() == Some(&key))
    })
}

pub struct SyncOrchestrator {
    store: Arc<dyn LocalStore>,
    server: Arc<dyn ServerApi>,
    connectivity: Connectivity,
    events: EventBus<SyncEvent>,
    resolver: ConflictResolver,
    config: SyncConfig,
    metrics: Arc<SyncMetrics>,
    gate: Mutex<()>,
    state: watch::Sender<SyncState>,
    consecutive_failures: AtomicU32,
    last_report: RwLock<Option<SyncReport>>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn LocalStore>,
        server: Arc<dyn ServerApi>,
        connectivity: Connectivity,
        events: EventBus<SyncEvent>,
        config: SyncConfig,
    ) -> Arc<Self> {
        let (state, _) = watch::channel(SyncState::Idle);
        Arc::new(Self {
            store,
            server,
            connectivity,
            events,
            resolver: ConflictResolver::new(),
            config,
            metrics: Arc::new(SyncMetrics::new()),
            gate: Mutex::new(()),
            state,
            consecutive_failures: AtomicU32::new(0),
            last_report: RwLock::new(None),
        })
    }

    pub fn events(&self) -> &EventBus<SyncEvent> {
        &self.events
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn metrics(&self) -> Arc<SyncMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Delay before the next scheduled cycle: the regular interval, or
    /// `base * 2^(n-1)` capped at `backoff_max` after `n` failed cycles.
    pub fn next_delay(&self) -> Duration {
        let failures = self.consecutive_failures.load(Ordering::Relaxed);
        if failures == 0 {
            return Duration::from_secs(self.config.sync_interval);
        }
        let exponent = (failures - 1).min(31);
        let delay = self
            .config
            .backoff_base
            .saturating_mul(1_u64 << exponent)
            .min(self.config.backoff_max);
        Duration::from_secs(delay)
    }

    pub async fn status(&self) -> Result<SyncStatus, AppError> {
        Ok(SyncStatus {
            state: self.state(),
            online: self.connectivity.is_online(),
            queue: self.store.queue_counts().await?,
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            next_delay_secs: self.next_delay().as_secs(),
            last_report: self.last_report().await,
            metrics: self.metrics.snapshot(),
        })
    }

    /// Latest cycle report, from this process or a previous one.
    pub async fn last_report(&self) -> Option<SyncReport> {
        if let Some(report) = self.last_report.read().await.clone() {
            return Some(report);
        }
        match self.store.get_setting(LAST_REPORT_SETTING).await {
            Ok(Some(value)) => serde_json::from_value(value).ok(),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read last sync report");
                None
            }
        }
    }

    pub async fn retry_failed(&self, id: Option<i64>) -> Result<u64, AppError> {
        let count = self.store.retry_failed(id).await?;
        tracing::info!(count, change_id = ?id, "failed changes requeued");
        Ok(count)
    }

    pub async fn clear_failed(&self, id: Option<i64>) -> Result<u64, AppError> {
        let count = self.store.clear_failed(id).await?;
        tracing::info!(count, change_id = ?id, "failed changes cleared");
        Ok(count)
    }

    /// Runs one cycle unless another is in flight.
    #[tracing::instrument(skip(self))]
    pub async fn run_cycle(&self, trigger: SyncTrigger) -> Result<SyncRun, AppError> {
        let Ok(_guard) = self.gate.try_lock() else {
            tracing::debug!("sync already running");
            return Ok(SyncRun::AlreadyRunning);
        };

        self.state.send_replace(SyncState::Syncing);
        self.events.publish(SyncEvent::Started { trigger });
        let result = self.cycle(trigger).await;
        self.state.send_replace(SyncState::Idle);

        match result {
            Ok(report) => {
                let report = report.finish();
                self.record_cycle(&report);
                *self.last_report.write().await = Some(report.clone());
                match serde_json::to_value(&report) {
                    Ok(value) => {
                        if let Err(err) = self.store.put_setting(LAST_REPORT_SETTING, &value).await {
                            tracing::warn!(error = %err, "failed to persist sync report");
                        }
                    }
                    Err(err) => tracing::warn!(error = %err, "failed to encode sync report"),
                }
                self.events.publish(SyncEvent::Completed(report.clone()));
                tracing::info!(
                    processed = report.processed,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    held = report.held,
                    aborted = ?report.aborted,
                    "sync cycle finished"
                );
                Ok(SyncRun::Completed(report))
            }
            Err(err) => {
                self.metrics.cycles.record_failure();
                self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
                tracing::error!(error = %err, "sync cycle failed");
                Err(err)
            }
        }
    }

    fn record_cycle(&self, report: &SyncReport) {
        let unhealthy = report.failed > 0 || report.aborted == Some(AbortReason::ProbeFailed);
        if unhealthy {
            self.metrics.cycles.record_failure();
            self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        } else {
            self.metrics.cycles.record_success();
            if report.aborted.is_none() {
                self.consecutive_failures.store(0, Ordering::Relaxed);
            }
        }
    }

    async fn cycle(&self, trigger: SyncTrigger) -> Result<SyncReport, AppError> {
        let mut report = SyncReport::started(trigger);

        if !self.connectivity.is_online() {
            report.aborted = Some(AbortReason::WentOffline);
            return Ok(report);
        }
        if let Err(err) = self.server.health().await {
            self.metrics.probes.record_failure();
            tracing::warn!(error = %err, "health probe failed; skipping cycle");
            report.aborted = Some(AbortReason::ProbeFailed);
            return Ok(report);
        }
        self.metrics.probes.record_success();

        let tag = match trigger {
            SyncTrigger::Tag(tag) => Some(tag),
            _ => None,
        };
        let queued = self.store.queued_changes().await?;
        let limit = usize::try_from(self.config.batch_size)
            .unwrap_or(usize::MAX)
            .max(1);
        let selection = select_changes(&queued, limit, tag, self.config.use_batch_endpoint);
        report.held = selection.held;

        if self.config.use_batch_endpoint {
            self.replay_batched(&selection.batch, &queued, &mut report)
                .await?;
        } else {
            self.replay_sequential(&selection.batch, &queued, &mut report)
                .await?;
        }

        if report.aborted.is_none() {
            let collections: Vec<Collection> = match tag {
                Some(tag) => tag.reference_collections().to_vec(),
                None => Collection::REFERENCE.to_vec(),
            };
            report.reference_refreshed = self.pull_reference(&collections).await?;
        }

        Ok(report)
    }

    async fn replay_sequential(
        &self,
        batch: &[QueuedChange],
        queued: &[QueuedChange],
        report: &mut SyncReport,
    ) -> Result<(), AppError> {
        let mut blocked: HashSet<OrderingKey> = HashSet::new();

        for candidate in batch {
            if !self.connectivity.is_online() {
                tracing::info!("went offline; ending cycle early");
                report.aborted = Some(AbortReason::WentOffline);
                break;
            }
            // Re-read: an earlier reconciliation may have re-keyed this change.
            let Some(change) = self.store.get_change(candidate.id).await? else {
                continue;
            };
            if change.status != QueueStatus::Pending {
                continue;
            }
            if candidate
                .ordering_key()
                .is_some_and(|key| blocked.contains(&key))
            {
                report.held += 1;
                continue;
            }

            report.processed += 1;
            match self.send(&change).await {
                Ok(outcome) => {
                    let followers = has_followers(candidate, queued);
                    self.acknowledge(&change, outcome, followers).await?;
                    report.succeeded += 1;
                }
                Err(err) => {
                    self.record_failure(&change, &err).await?;
                    report.failed += 1;
                    if let Some(key) = candidate.ordering_key() {
                        blocked.insert(key);
                    }
                }
            }
        }

        Ok(())
    }

    async fn replay_batched(
        &self,
        batch: &[QueuedChange],
        queued: &[QueuedChange],
        report: &mut SyncReport,
    ) -> Result<(), AppError> {
        if batch.is_empty() {
            return Ok(());
        }
        if !self.connectivity.is_online() {
            report.aborted = Some(AbortReason::WentOffline);
            return Ok(());
        }

        // Acknowledgements have their own route and never ride the batch body.
        let (acknowledgements, changes): (Vec<QueuedChange>, Vec<QueuedChange>) = batch
            .iter()
            .cloned()
            .partition(|change| change.acknowledgement().is_some());
        for change in &acknowledgements {
            report.processed += 1;
            let result = self.send(change).await;
            self.settle(change, result, queued, report).await?;
        }
        if changes.is_empty() {
            return Ok(());
        }

        report.processed += changes.len();
        let outcomes = match self.server.replay_batch(&changes).await {
            Ok(outcomes) => outcomes,
            Err(err) => {
                for change in &changes {
                    self.record_failure(change, &err).await?;
                }
                report.failed += changes.len();
                return Ok(());
            }
        };

        let by_id: HashMap<i64, &QueuedChange> =
            changes.iter().map(|change| (change.id, change)).collect();
        for outcome in outcomes {
            let Some(change) = by_id.get(&outcome.change_id) else {
                tracing::warn!(change_id = outcome.change_id, "batch result for unknown change");
                continue;
            };
            self.settle(change, outcome.result, queued, report).await?;
        }

        Ok(())
    }

    async fn send(&self, change: &QueuedChange) -> Result<ReplayOutcome, AppError> {
        match change.acknowledgement() {
            Some((alert_id, at)) => {
                self.server.acknowledge_alert(&alert_id, at).await?;
                Ok(ReplayOutcome::default())
            }
            None => self.server.replay(change).await,
        }
    }

    async fn settle(
        &self,
        change: &QueuedChange,
        result: Result<ReplayOutcome, AppError>,
        queued: &[QueuedChange],
        report: &mut SyncReport,
    ) -> Result<(), AppError> {
        match result {
            Ok(replayed) => {
                let followers = has_followers(change, queued);
                self.acknowledge(change, replayed, followers).await?;
                report.succeeded += 1;
            }
            Err(err) => {
                self.record_failure(change, &err).await?;
                report.failed += 1;
            }
        }
        Ok(())
    }

    /// Removes the change and folds the server's answer into the local record.
    /// With later changes still queued for the record it stays dirty.
    async fn acknowledge(
        &self,
        change: &QueuedChange,
        outcome: ReplayOutcome,
        has_followers: bool,
    ) -> Result<(), AppError> {
        let reconciliation = match (change.action, change.record_key.as_ref()) {
            (ChangeAction::Delete, _) | (_, None) => None,
            (ChangeAction::Create, Some(local_key)) if local_key.is_local() => {
                match outcome.server_id.as_deref() {
                    Some(server_id) => {
                        self.reconcile_created(change, local_key, server_id, &outcome, has_followers)
                            .await?
                    }
                    None => {
                        tracing::warn!(change_id = change.id, "create acknowledged without a server id");
                        None
                    }
                }
            }
            (_, Some(key)) => match self.store.get(change.table, key).await? {
                Some(mut record) if !has_followers => {
                    record.is_synced = true;
                    Some(Reconciliation {
                        collection: change.table,
                        local_key: key.clone(),
                        record,
                    })
                }
                _ => None,
            },
        };

        let reconciled = reconciliation.as_ref().and_then(|rec| {
            (rec.local_key != rec.record.key).then(|| SyncEvent::Reconciled {
                collection: rec.collection.to_string(),
                local_key: rec.local_key.to_string(),
                server_key: rec.record.key.to_string(),
            })
        });

        self.store.complete_change(change.id, reconciliation).await?;
        self.metrics.changes.record_success();
        tracing::debug!(change_id = change.id, action = %change.action, table = %change.table, "change synced");

        if let Some(event) = reconciled {
            self.events.publish(event);
        }
        self.events.publish(SyncEvent::ChangeSynced {
            change_id: change.id,
            server_id: outcome.server_id,
        });
        Ok(())
    }

    async fn reconcile_created(
        &self,
        change: &QueuedChange,
        local_key: &RecordKey,
        server_id: &str,
        outcome: &ReplayOutcome,
        has_followers: bool,
    ) -> Result<Option<Reconciliation>, AppError> {
        let server_data = if has_followers {
            None
        } else {
            outcome.body.as_ref()
        };

        let record = match self.store.get(change.table, local_key).await? {
            Some(local) => {
                let mut record = local
                    .reconciled(server_id, server_data)
                    .map_err(AppError::ValidationError)?;
                record.is_synced = !has_followers;
                record
            }
            // Already reconciled by an earlier attempt; overwrite with what the server sent.
            None => match outcome.body.clone() {
                Some(body) => {
                    let mut record =
                        OfflineRecord::from_server(body).map_err(AppError::ValidationError)?;
                    record.key = RecordKey::new(server_id).map_err(AppError::ValidationError)?;
                    record.local_id = change.local_id.clone();
                    record
                }
                None => return Ok(None),
            },
        };

        Ok(Some(Reconciliation {
            collection: change.table,
            local_key: local_key.clone(),
            record,
        }))
    }

    async fn record_failure(&self, change: &QueuedChange, err: &AppError) -> Result<(), AppError> {
        let freeze = self.config.fail_fast_on_rejection && err.is_rejection();
        let updated = self
            .store
            .record_failure(change.id, &err.to_string(), self.config.max_retry, freeze)
            .await?;
        self.metrics.changes.record_failure();

        let frozen = updated.is_frozen();
        if frozen {
            tracing::warn!(
                change_id = change.id,
                retry_count = updated.retry_count,
                error = %err,
                "change frozen as failed"
            );
        } else {
            tracing::debug!(
                change_id = change.id,
                retry_count = updated.retry_count,
                error = %err,
                "change replay failed"
            );
        }

        self.events.publish(SyncEvent::ChangeFailed {
            change_id: change.id,
            error: err.to_string(),
            frozen,
        });
        Ok(())
    }

    /// Pulls reference collections and merges them into the store. Records
    /// with a queued delete are not brought back; synced rows the server no
    /// longer lists are dropped.
    async fn pull_reference(&self, collections: &[Collection]) -> Result<usize, AppError> {
        let deleting: HashSet<OrderingKey> = self
            .store
            .queued_changes()
            .await?
            .iter()
            .filter(|change| change.action == ChangeAction::Delete)
            .filter_map(QueuedChange::ordering_key)
            .collect();

        let mut refreshed = 0;
        for collection in collections {
            let items = match self.server.fetch_collection(*collection).await {
                Ok(items) => items,
                Err(err) => {
                    tracing::warn!(collection = %collection, error = %err, "reference pull failed");
                    continue;
                }
            };

            let local: HashMap<RecordKey, OfflineRecord> = self
                .store
                .get_all(*collection)
                .await?
                .into_iter()
                .map(|record| (record.key.clone(), record))
                .collect();
            let mut plan = self
                .resolver
                .plan(items, |server| local.get(&server.key).cloned());
            if !plan.kept_local.is_empty() {
                tracing::debug!(
                    collection = %collection,
                    kept = plan.kept_local.len(),
                    "local edits newer than server copy"
                );
            }
            plan.accepted
                .retain(|record| !deleting.contains(&(*collection, record.key.clone())));

            let outcome = self
                .store
                .import_snapshot(*collection, plan.accepted)
                .await?;
            if outcome.removed > 0 {
                tracing::debug!(
                    collection = %collection,
                    removed = outcome.removed,
                    "dropped records the server no longer lists"
                );
            }
            refreshed += outcome.imported;
        }
        Ok(refreshed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::LocalId;
    use chrono::Utc;
    use serde_json::json;

    fn change(id: i64, key: &str, status: QueueStatus) -> QueuedChange {
        QueuedChange {
            id,
            idempotency_key: format!("k{id}"),
            tag: SyncTag::TaskSync,
            table: Collection::Tasks,
            action: ChangeAction::Update,
            record_key: Some(RecordKey::new(key).unwrap()),
            payload: json!({"id": key}),
            created_at: Utc::now(),
            retry_count: 0,
            status,
            local_id: None::<LocalId>,
            server_id: None,
            last_error: None,
            last_attempt_at: None,
        }
    }

    #[test]
    fn frozen_change_holds_its_record_only() {
        let queued = vec![
            change(1, "a", QueueStatus::Failed),
            change(2, "a", QueueStatus::Pending),
            change(3, "b", QueueStatus::Pending),
        ];
        let selection = select_changes(&queued, 25, None, false);
        let ids: Vec<i64> = selection.batch.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3]);
        assert_eq!(selection.held, 1);
    }

    #[test]
    fn batch_is_bounded_and_fifo() {
        let queued: Vec<QueuedChange> = (1..=30)
            .map(|id| change(id, &format!("r{id}"), QueueStatus::Pending))
            .collect();
        let selection = select_changes(&queued, 25, None, false);
        assert_eq!(selection.batch.len(), 25);
        assert_eq!(selection.batch.first().map(|c| c.id), Some(1));
        assert_eq!(selection.batch.last().map(|c| c.id), Some(25));
    }

    #[test]
    fn batch_mode_takes_one_change_per_record() {
        let queued = vec![
            change(1, "a", QueueStatus::Pending),
            change(2, "a", QueueStatus::Pending),
            change(3, "b", QueueStatus::Pending),
        ];
        let selection = select_changes(&queued, 25, None, true);
        let ids: Vec<i64> = selection.batch.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(selection.held, 1);
    }

    #[test]
    fn tag_filter_limits_selection() {
        let mut berth = change(2, "b", QueueStatus::Pending);
        berth.tag = SyncTag::BerthAssignment;
        let queued = vec![change(1, "a", QueueStatus::Pending), berth];
        let selection = select_changes(&queued, 25, Some(SyncTag::BerthAssignment), false);
        assert_eq!(selection.batch.len(), 1);
        assert_eq!(selection.batch[0].id, 2);
    }
}
