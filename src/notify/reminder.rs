use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::RangeInclusive;

use chrono::{NaiveDate, NaiveDateTime};

use crate::calendar::Event;

pub const DISMISS_WINDOW_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReminderTier {
    TenMinutes,
    OneMinute,
    Starting,
}

impl ReminderTier {
    pub const ALL: [ReminderTier; 3] = [
        ReminderTier::TenMinutes,
        ReminderTier::OneMinute,
        ReminderTier::Starting,
    ];

    /// Seconds-to-start covered by the tier, inclusive on both ends.
    pub fn window(self) -> RangeInclusive<i64> {
        match self {
            ReminderTier::TenMinutes => 570..=600,
            ReminderTier::OneMinute => 30..=60,
            ReminderTier::Starting => -60..=0,
        }
    }

    pub fn for_offset(seconds_to_start: i64) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.window().contains(&seconds_to_start))
    }

    pub fn label(self) -> &'static str {
        match self {
            ReminderTier::TenMinutes => "10min",
            ReminderTier::OneMinute => "1min",
            ReminderTier::Starting => "start",
        }
    }

    pub fn headline(self, title: &str) -> String {
        match self {
            ReminderTier::TenMinutes => format!("In 10 minutes: {}", title),
            ReminderTier::OneMinute => format!("In 1 minute: {}", title),
            ReminderTier::Starting => format!("Starting now: {}", title),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NotificationId {
    event_id: String,
    date: NaiveDate,
    tier: ReminderTier,
}

impl NotificationId {
    pub fn new(event: &Event, tier: ReminderTier) -> Self {
        Self {
            event_id: event.id().to_string(),
            date: event.date(),
            tier,
        }
    }

    pub fn tier(&self) -> ReminderTier {
        self.tier
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.event_id,
            self.date.format("%Y%m%d"),
            self.tier.label()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    pub id: NotificationId,
    pub event_id: String,
    pub title: String,
    pub message: String,
}

impl Reminder {
    pub fn tier(&self) -> ReminderTier {
        self.id.tier()
    }
}

pub fn seconds_to_start(event: &Event, now: NaiveDateTime) -> i64 {
    (event.start - now).num_seconds()
}

pub fn is_suppressed(dismissed_at: Option<&NaiveDateTime>, now: NaiveDateTime) -> bool {
    dismissed_at
        .map(|at| (now - *at).num_seconds() < DISMISS_WINDOW_SECONDS)
        .unwrap_or(false)
}

/// Pure eligibility check: which tier, if any, the event is in right now.
pub fn due_tier(
    event: &Event,
    now: NaiveDateTime,
    dismissed: &HashMap<String, NaiveDateTime>,
) -> Option<ReminderTier> {
    if is_suppressed(dismissed.get(event.id()), now) {
        return None;
    }
    ReminderTier::for_offset(seconds_to_start(event, now))
}

pub fn format_message(event: &Event, tier: ReminderTier) -> String {
    let mut message = format!(
        "{}\n\nTime: {} - {}",
        tier.headline(&event.title),
        event.start.format("%d.%m.%Y %H:%M"),
        event.end.format("%d.%m.%Y %H:%M")
    );
    if !event.description.is_empty() {
        message.push_str(&format!("\n\nDescription: {}", event.description));
    }
    message
}

/// Per-process reminder bookkeeping. `shown` only grows; a restart starts over.
#[derive(Debug, Default)]
pub struct ReminderTracker {
    dismissed: HashMap<String, NaiveDateTime>,
    shown: HashSet<NotificationId>,
}

impl ReminderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dismissed(dismissed: HashMap<String, NaiveDateTime>) -> Self {
        Self {
            dismissed,
            shown: HashSet::new(),
        }
    }

    pub fn dismiss(&mut self, event_id: &str, at: NaiveDateTime) {
        tracing::info!("Reminders for {} dismissed at {}", event_id, at);
        self.dismissed.insert(event_id.to_string(), at);
    }

    /// Folds in dismissals recorded elsewhere, keeping the latest per event.
    pub fn absorb_dismissed(&mut self, dismissed: HashMap<String, NaiveDateTime>) {
        for (event_id, at) in dismissed {
            self.dismissed
                .entry(event_id)
                .and_modify(|current| {
                    if at > *current {
                        *current = at;
                    }
                })
                .or_insert(at);
        }
    }

    pub fn dismissed(&self) -> &HashMap<String, NaiveDateTime> {
        &self.dismissed
    }

    pub fn should_notify(&self, event: &Event, now: NaiveDateTime) -> bool {
        due_tier(event, now, &self.dismissed).is_some()
    }

    pub fn has_shown(&self, id: &NotificationId) -> bool {
        self.shown.contains(id)
    }

    pub fn shown_count(&self) -> usize {
        self.shown.len()
    }

    /// Returns the reminders that become visible at `now` and records them as
    /// shown. An event id yields at most one reminder per call.
    pub fn evaluate(&mut self, events: &[Event], now: NaiveDateTime) -> Vec<Reminder> {
        let mut notified: HashSet<&str> = HashSet::new();
        let mut reminders = Vec::new();

        for event in events {
            if notified.contains(event.id()) {
                continue;
            }
            let Some(tier) = due_tier(event, now, &self.dismissed) else {
                continue;
            };
            notified.insert(event.id());

            let id = NotificationId::new(event, tier);
            if !self.shown.insert(id.clone()) {
                continue;
            }

            tracing::info!("Reminder {} due", id);
            reminders.push(Reminder {
                id,
                event_id: event.id().to_string(),
                title: event.title.clone(),
                message: format_message(event, tier),
            });
        }

        reminders
    }
}
