use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

use crate::calendar::color::Color;
use crate::calendar::record::{format_timestamp, parse_timestamp, EventRecord};

#[derive(Debug, Error, PartialEq)]
pub enum EventError {
    #[error("Invalid start time '{1}' for event '{0}'")]
    InvalidStart(String, String),
    #[error("Invalid end time '{1}' for event '{0}'")]
    InvalidEnd(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EventSource {
    #[default]
    Local,
    Server,
}

impl EventSource {
    pub fn code(self) -> u8 {
        match self {
            EventSource::Local => 0,
            EventSource::Server => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EventSource::Local => "local",
            EventSource::Server => "server",
        }
    }
}

impl Serialize for EventSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for EventSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Code(i64),
            Name(String),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::Code(1) => EventSource::Server,
            Repr::Code(_) => EventSource::Local,
            Repr::Name(name) if name.eq_ignore_ascii_case("server") => EventSource::Server,
            Repr::Name(_) => EventSource::Local,
        })
    }
}

/// Identity is the id alone. `==` compares every field and is meant for
/// tests; match events by [`Event::id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "EventRecord", try_from = "EventRecord")]
pub struct Event {
    id: String,
    pub title: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub color: Color,
    pub source: EventSource,
}

/// The fields an edit form hands back; identity and provenance stay with the store.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub color: Color,
}

impl EventDraft {
    pub fn new(title: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            start,
            end,
            color: Color::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }
}

impl Event {
    pub fn new(title: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title, start, end)
    }

    pub fn with_id(
        id: impl Into<String>,
        title: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        let id = id.into();
        let id = if id.is_empty() { Uuid::new_v4().to_string() } else { id };
        Self {
            id,
            title: title.into(),
            description: String::new(),
            start: truncate_to_minute(start),
            end: truncate_to_minute(end),
            color: Color::default(),
            source: EventSource::Local,
        }
    }

    pub fn from_draft(draft: EventDraft, source: EventSource) -> Self {
        Self::new(draft.title, draft.start, draft.end)
            .with_description(draft.description)
            .with_color(draft.color)
            .with_source(source)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_source(mut self, source: EventSource) -> Self {
        self.source = source;
        self
    }

    /// Applies edited fields while keeping the id and provenance.
    pub fn revised(&self, draft: EventDraft) -> Self {
        Self {
            id: self.id.clone(),
            title: draft.title,
            description: draft.description,
            start: truncate_to_minute(draft.start),
            end: truncate_to_minute(draft.end),
            color: draft.color,
            source: self.source,
        }
    }

    /// Same event stored under the id the server chose for it.
    pub fn reassigned(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..self.clone()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && !self.title.is_empty()
    }

    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            start: format_timestamp(&self.start),
            end: format_timestamp(&self.end),
            color: self.color.clone(),
            source: Some(self.source),
        }
    }

    /// Missing ids stay empty so the event reports itself invalid instead of
    /// picking up a fresh identity.
    pub fn from_record(record: EventRecord) -> Result<Self, EventError> {
        let start = parse_timestamp(&record.start)
            .ok_or_else(|| EventError::InvalidStart(record.id.clone(), record.start.clone()))?;
        let end = parse_timestamp(&record.end)
            .ok_or_else(|| EventError::InvalidEnd(record.id.clone(), record.end.clone()))?;

        Ok(Self {
            id: record.id,
            title: record.title,
            description: record.description,
            start: truncate_to_minute(start),
            end: truncate_to_minute(end),
            color: record.color,
            source: record.source.unwrap_or_default(),
        })
    }
}

impl From<Event> for EventRecord {
    fn from(event: Event) -> Self {
        event.to_record()
    }
}

impl TryFrom<EventRecord> for Event {
    type Error = EventError;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        Event::from_record(record)
    }
}

fn truncate_to_minute(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(timestamp)
}
