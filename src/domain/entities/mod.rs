pub mod cached_response;
pub mod critical_alert;
pub mod offline_record;
pub mod queued_change;
pub mod sync_report;
pub mod wizard_draft;

pub use cached_response::CachedResponse;
pub use critical_alert::{CriticalAlert, PushData, PushPayload};
pub use offline_record::OfflineRecord;
pub use queued_change::{QueuedChange, QueuedChangeDraft, acknowledgement_path};
pub use sync_report::{AbortReason, SyncReport, SyncTrigger};
pub use wizard_draft::WizardDraft;
