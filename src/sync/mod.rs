pub mod failure;
pub mod merge;
pub mod remote;
pub mod sync_engine;

pub use failure::SyncFailure;
pub use merge::{merge_download, MergeReport};
pub use remote::{ApiError, HttpCalendarClient, RemoteCalendar};
pub use sync_engine::{CycleOutcome, Operation, SyncEngine, SyncError, SyncEvent, SyncState};
