pub mod alert_service;
pub mod cache_router;
pub mod change_tracker;
pub mod conflict_resolver;
pub mod maintenance;
pub mod sync_orchestrator;

pub use alert_service::{AckDelivery, AlertService, PushReceipt};
pub use cache_router::{CacheRouter, ResponseSource, RouteClass, RoutedResponse};
pub use change_tracker::ChangeTracker;
pub use conflict_resolver::{ConflictResolver, Resolution};
pub use maintenance::{Maintenance, MaintenanceReport};
pub use sync_orchestrator::{SyncOrchestrator, SyncRun, SyncStatus};
