pub mod change_action;
pub mod collection;
pub mod priority_tier;
pub mod queue_status;
pub mod record_key;
pub mod severity;
pub mod sync_tag;

pub use change_action::ChangeAction;
pub use collection::{Collection, IndexName};
pub use priority_tier::{FetchStrategy, PriorityTier};
pub use queue_status::QueueStatus;
pub use record_key::{LocalId, RecordKey};
pub use severity::{AlertKind, Severity};
pub use sync_tag::SyncTag;
