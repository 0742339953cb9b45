pub mod app;
pub mod calendar;
pub mod notify;
pub mod storage;
pub mod sync;

pub use app::{App, AppError, SyncStatus};
pub use calendar::{Color, Event, EventDraft, EventSource};
pub use notify::{Notifier, ReminderTicker, ReminderTracker};
pub use storage::Config;
pub use sync::{SyncEngine, SyncFailure};
