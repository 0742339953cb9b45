use chrono::{DateTime, Local, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

use crate::calendar::color::Color;
use crate::calendar::event::EventSource;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const ACCEPTED_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S%.f"];

/// Flat key-value shape shared by `events.json`, export files and the remote API.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(default, deserialize_with = "nullable_string")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub start: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub end: String,
    #[serde(default)]
    pub color: Color,
    #[serde(default)]
    pub source: Option<EventSource>,
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    ACCEPTED_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 10)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn parses_timestamp_without_seconds() {
        assert_eq!(parse_timestamp("2025-01-10T09:00"), Some(at(9, 0)));
    }

    #[test]
    fn parses_timestamp_with_seconds() {
        assert_eq!(parse_timestamp("2025-01-10T09:30:00"), Some(at(9, 30)));
    }

    #[test]
    fn rejects_garbage_timestamp() {
        assert_eq!(parse_timestamp("tomorrow morning"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn formats_timestamp_as_local_iso() {
        assert_eq!(format_timestamp(&at(9, 0)), "2025-01-10T09:00:00");
    }

    #[test]
    fn record_tolerates_missing_fields() {
        let record: EventRecord = serde_json::from_str(r#"{"title": "Standup"}"#).unwrap();

        assert_eq!(record.title, "Standup");
        assert_eq!(record.id, "");
        assert_eq!(record.source, None);
        assert_eq!(record.color, Color::default());
    }

    #[test]
    fn record_treats_null_text_as_empty() {
        let record: EventRecord =
            serde_json::from_str(r#"{"id": "e1", "description": null}"#).unwrap();

        assert_eq!(record.description, "");
    }
}
