pub mod conflict;
pub mod cursor;
pub mod engine;
pub mod notify;
pub mod snapshot;
pub mod update_check;

/// 毫秒级 Unix 时间戳
pub type Timestamp = i64;

pub use conflict::{
    ConflictInfo, ConflictPolicy, ConflictPrompt, ConflictResolution, ConfirmPrompt, Confirmation,
    PolicyPrompt,
};
pub use cursor::{CursorStore, MemoryCursorStore, SyncCursor};
pub use engine::{SyncCoordinator, SyncOutcome, MAX_STALE_RETRIES};
pub use notify::{CollectingNotifier, Notifier, TracingNotifier};
pub use snapshot::{Snapshot, SnapshotImporter, SnapshotSource};
pub use update_check::{check_for_update, is_local_only_change, CheckInput, UpdateCheck};
