use crate::application::ports::server_api::ServerApi;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shared online/offline flag. Whoever observes the platform network state
/// flips it; sync and scheduling read it.
#[derive(Debug, Clone)]
pub struct Connectivity {
    sender: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Returns whether the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            tracing::info!(online, "connectivity changed");
        }
        changed
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Headless hosts have no platform network events, so the health endpoint
/// stands in for them.
pub fn spawn_probe(
    connectivity: Connectivity,
    server: Arc<dyn ServerApi>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let online = match server.health().await {
                Ok(()) => true,
                Err(err) => {
                    tracing::debug!(error = %err, "connectivity probe failed");
                    false
                }
            };
            connectivity.set_online(online);
            tokio::time::sleep(interval).await;
        }
    })
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}
