use crate::application::services::CacheRouter;
use crate::shared::error::AppError;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use url::Url;

const CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerVersion {
    pub version: String,
    pub active: bool,
}

/// Page-to-worker messages. Every message carries its reply port.
#[derive(Debug)]
pub enum WorkerMessage {
    SkipWaiting {
        reply: oneshot::Sender<Result<Vec<String>, AppError>>,
    },
    GetVersion {
        reply: oneshot::Sender<WorkerVersion>,
    },
    CacheUrls {
        urls: Vec<Url>,
        reply: oneshot::Sender<Result<usize, AppError>>,
    },
    ClearCache {
        cache_name: String,
        reply: oneshot::Sender<Result<u64, AppError>>,
    },
}

/// Cloneable sender side of the control channel.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    sender: mpsc::Sender<WorkerMessage>,
}

impl WorkerHandle {
    /// Activates the waiting version and returns the caches it dropped.
    pub async fn skip_waiting(&self) -> Result<Vec<String>, AppError> {
        let (reply, response) = oneshot::channel();
        self.send(WorkerMessage::SkipWaiting { reply }).await?;
        response.await.map_err(|_| stopped())?
    }

    pub async fn version(&self) -> Result<WorkerVersion, AppError> {
        let (reply, response) = oneshot::channel();
        self.send(WorkerMessage::GetVersion { reply }).await?;
        response.await.map_err(|_| stopped())
    }

    pub async fn cache_urls(&self, urls: Vec<Url>) -> Result<usize, AppError> {
        let (reply, response) = oneshot::channel();
        self.send(WorkerMessage::CacheUrls { urls, reply }).await?;
        response.await.map_err(|_| stopped())?
    }

    pub async fn clear_cache(&self, cache_name: impl Into<String>) -> Result<u64, AppError> {
        let (reply, response) = oneshot::channel();
        self.send(WorkerMessage::ClearCache {
            cache_name: cache_name.into(),
            reply,
        })
        .await?;
        response.await.map_err(|_| stopped())?
    }

    async fn send(&self, message: WorkerMessage) -> Result<(), AppError> {
        self.sender.send(message).await.map_err(|_| stopped())
    }
}

fn stopped() -> AppError {
    AppError::Internal("cache worker is not running".to_string())
}

/// Actor owning the cache router on the worker side.
pub struct CacheWorker {
    router: CacheRouter,
    active: bool,
}

impl CacheWorker {
    pub fn new(router: CacheRouter) -> Self {
        Self {
            router,
            active: false,
        }
    }

    /// Spawns the actor; it stops when every handle is dropped.
    pub fn spawn(self) -> (WorkerHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(self.run(receiver));
        (WorkerHandle { sender }, task)
    }

    async fn run(mut self, mut receiver: mpsc::Receiver<WorkerMessage>) {
        tracing::info!(version = %self.router.version(), "cache worker started");
        while let Some(message) = receiver.recv().await {
            self.handle(message).await;
        }
        tracing::info!("cache worker stopped");
    }

    async fn handle(&mut self, message: WorkerMessage) {
        // A dropped reply port only means the caller stopped waiting.
        match message {
            WorkerMessage::SkipWaiting { reply } => {
                let result = self.router.rotate().await;
                if result.is_ok() {
                    self.active = true;
                    tracing::info!(version = %self.router.version(), "worker activated");
                }
                let _ = reply.send(result);
            }
            WorkerMessage::GetVersion { reply } => {
                let _ = reply.send(WorkerVersion {
                    version: self.router.version().to_string(),
                    active: self.active,
                });
            }
            WorkerMessage::CacheUrls { urls, reply } => {
                let result = self.router.precache(&urls).await;
                if let Err(err) = &result {
                    tracing::warn!(error = %err, count = urls.len(), "precache failed");
                }
                let _ = reply.send(result);
            }
            WorkerMessage::ClearCache { cache_name, reply } => {
                let _ = reply.send(self.router.clear_cache(&cache_name).await);
            }
        }
    }
}
