pub mod reminder;
pub mod surface;
pub mod ticker;
pub mod watch;

pub use reminder::{NotificationId, Reminder, ReminderTier, ReminderTracker};
pub use surface::{ConsoleSurface, DesktopSurface, NotificationSurface, Notifier, NotifyError};
pub use ticker::ReminderTicker;
pub use watch::ReminderWatch;
