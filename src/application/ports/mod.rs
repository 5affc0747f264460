pub mod fetcher;
pub mod local_store;
pub mod notifier;
pub mod server_api;

pub use fetcher::{FetchRequest, FetchResponse, Fetcher};
pub use local_store::{
    AlertStore, ChangeQueueStore, DraftStore, LocalStore, QueueCounts, Reconciliation,
    RecordStore, ResponseCacheStore, SettingsStore, StoreOp, TransactionOutcome,
};
pub use notifier::{NotificationAction, NotificationSpec, Notifier, Urgency};
pub use server_api::{BatchItemOutcome, ReplayOutcome, ServerApi};
