pub mod connectivity;
pub mod control;
pub mod event_bus;
pub mod scheduler;

pub use connectivity::Connectivity;
pub use control::{CacheWorker, WorkerHandle, WorkerMessage, WorkerVersion};
pub use event_bus::{EventBus, Subscription};
pub use scheduler::{SchedulerHandle, SyncScheduler};
