use crate::application::services::{Maintenance, SyncOrchestrator, SyncRun};
use crate::domain::entities::SyncTrigger;
use crate::domain::value_objects::SyncTag;
use crate::shared::error::AppError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug)]
enum Command {
    Sync {
        trigger: SyncTrigger,
        reply: Option<oneshot::Sender<Result<SyncRun, AppError>>>,
    },
    Visibility(bool),
    Shutdown,
}

/// Handle to a running scheduler task.
pub struct SchedulerHandle {
    sender: mpsc::Sender<Command>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Runs a manual cycle and waits for its outcome.
    pub async fn sync_now(&self) -> Result<SyncRun, AppError> {
        self.request(SyncTrigger::Manual).await
    }

    /// Runs the background-sync routine registered for `tag`.
    pub async fn sync_tag(&self, tag: SyncTag) -> Result<SyncRun, AppError> {
        self.request(SyncTrigger::Tag(tag)).await
    }

    /// Fire-and-forget variant of [`Self::sync_tag`].
    pub async fn register_sync(&self, tag: SyncTag) -> Result<(), AppError> {
        self.send(Command::Sync {
            trigger: SyncTrigger::Tag(tag),
            reply: None,
        })
        .await
    }

    /// Reports page visibility. Becoming visible triggers a cycle.
    pub async fn set_visible(&self, visible: bool) -> Result<(), AppError> {
        self.send(Command::Visibility(visible)).await
    }

    pub async fn shutdown(self) {
        if self.sender.send(Command::Shutdown).await.is_err() {
            tracing::debug!("scheduler already stopped");
        }
        if let Err(err) = self.task.await {
            tracing::warn!(error = %err, "scheduler task ended abnormally");
        }
    }

    async fn request(&self, trigger: SyncTrigger) -> Result<SyncRun, AppError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Sync {
            trigger,
            reply: Some(reply),
        })
        .await?;
        response.await.map_err(|_| stopped())?
    }

    async fn send(&self, command: Command) -> Result<(), AppError> {
        self.sender.send(command).await.map_err(|_| stopped())
    }
}

fn stopped() -> AppError {
    AppError::Internal("sync scheduler is not running".to_string())
}

/// Drives sync cycles from the periodic timer, connectivity, visibility and
/// explicit requests, and runs maintenance on its own interval.
pub struct SyncScheduler {
    orchestrator: Arc<SyncOrchestrator>,
    maintenance: Option<Arc<Maintenance>>,
    maintenance_interval: Duration,
}

impl SyncScheduler {
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            orchestrator,
            maintenance: None,
            maintenance_interval: Duration::from_secs(60 * 60),
        }
    }

    pub fn with_maintenance(mut self, maintenance: Arc<Maintenance>, interval: Duration) -> Self {
        self.maintenance = Some(maintenance);
        self.maintenance_interval = interval.max(Duration::from_secs(1));
        self
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (sender, receiver) = mpsc::channel(16);
        // Subscribe before returning so no transition after spawn is missed.
        let online = self.orchestrator.connectivity().subscribe();
        let task = tokio::spawn(self.run(receiver, online));
        SchedulerHandle { sender, task }
    }

    async fn run(self, mut commands: mpsc::Receiver<Command>, mut online: watch::Receiver<bool>) {
        let auto_sync = self.orchestrator.config().auto_sync;
        let mut was_online = *online.borrow_and_update();
        let mut visible = true;
        let mut next_periodic = Instant::now() + self.orchestrator.next_delay();

        let mut maintenance_tick = tokio::time::interval(self.maintenance_interval);
        maintenance_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(auto_sync, "sync scheduler started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(next_periodic), if auto_sync => {
                    self.cycle(SyncTrigger::Periodic).await;
                    next_periodic = Instant::now() + self.orchestrator.next_delay();
                }
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *online.borrow_and_update();
                    if now_online && !was_online {
                        self.cycle(SyncTrigger::ConnectivityRegained).await;
                        next_periodic = Instant::now() + self.orchestrator.next_delay();
                    }
                    was_online = now_online;
                }
                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(Command::Sync { trigger, reply }) => {
                        let result = self.orchestrator.run_cycle(trigger).await;
                        if let Err(err) = &result {
                            tracing::warn!(error = %err, ?trigger, "requested sync failed");
                        }
                        if let Some(reply) = reply {
                            let _ = reply.send(result);
                        }
                    }
                    Some(Command::Visibility(now_visible)) => {
                        if now_visible && !visible {
                            self.cycle(SyncTrigger::VisibilityRegained).await;
                        }
                        visible = now_visible;
                    }
                },
                _ = maintenance_tick.tick(), if self.maintenance.is_some() => {
                    if let Some(maintenance) = &self.maintenance {
                        if let Err(err) = maintenance.run().await {
                            tracing::warn!(error = %err, "maintenance failed");
                        }
                    }
                }
            }
        }
        tracing::info!("sync scheduler stopped");
    }

    async fn cycle(&self, trigger: SyncTrigger) {
        if let Err(err) = self.orchestrator.run_cycle(trigger).await {
            tracing::warn!(error = %err, ?trigger, "scheduled sync failed");
        }
    }
}
