//! Data models for Stillwater

mod journal;
mod mood;
mod record;
mod session;
mod settings;
mod sync_conflict;
mod sync_status;

pub use journal::{extract_tags, JournalEntry};
pub use mood::MoodEntry;
pub use record::{DomainRecord, PerDomain, RecordDomain, RecordMeta, RecordStatus, SyncableRecord};
pub use session::SessionProgress;
pub use settings::{BackgroundSyncConfig, BackgroundSyncConfigUpdate};
pub use sync_conflict::{ConflictResolution, ResolutionKind, ResolutionStrategy, SyncConflict};
pub use sync_status::{DataUsage, SyncPreferences, SyncStatus};
