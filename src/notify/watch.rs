use chrono::NaiveDateTime;

use crate::calendar::Event;
use crate::notify::reminder::ReminderTracker;
use crate::notify::surface::Notifier;
use crate::storage::DismissedFile;

/// One reminder check per tick: fold in dismissals written by other
/// processes, evaluate the snapshot, hand due reminders to the notifier.
pub struct ReminderWatch {
    tracker: ReminderTracker,
    dismissed_file: DismissedFile,
    notifier: Notifier,
}

impl ReminderWatch {
    pub fn new(dismissed_file: DismissedFile, notifier: Notifier) -> Self {
        let tracker = ReminderTracker::with_dismissed(dismissed_file.load());
        Self {
            tracker,
            dismissed_file,
            notifier,
        }
    }

    pub fn tracker(&self) -> &ReminderTracker {
        &self.tracker
    }

    /// Returns how many reminders some surface actually showed.
    pub fn on_tick(&mut self, events: &[Event], now: NaiveDateTime) -> usize {
        self.tracker.absorb_dismissed(self.dismissed_file.load());

        let due = self.tracker.evaluate(events, now);
        let shown = due
            .iter()
            .filter(|reminder| self.notifier.deliver(reminder))
            .count();

        if !due.is_empty() {
            tracing::debug!("Tick at {}: {} due, {} shown", now, due.len(), shown);
        }
        shown
    }
}
