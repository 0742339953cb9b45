use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::calendar::{Event, EventRecord, EventSource};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to access events file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Events file does not contain a JSON array")]
    NotAnArray,
}

/// Durable home of the local collection (`events.json`).
#[derive(Debug, Clone)]
pub struct EventFile {
    path: PathBuf,
}

impl EventFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Storage problems are never fatal: anything unreadable counts as
    /// "no local events yet".
    pub fn load(&self) -> Vec<Event> {
        if !self.path.exists() {
            tracing::info!("No local events file at {}", self.path.display());
            return Vec::new();
        }

        match self.try_load() {
            Ok(events) => {
                tracing::info!("Loaded {} local events", events.len());
                events
            }
            Err(e) => {
                tracing::warn!("Could not load {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    pub fn try_load(&self) -> Result<Vec<Event>, StorageError> {
        read_events(&self.path)
    }

    pub fn save<'a>(&self, events: impl IntoIterator<Item = &'a Event>) -> Result<usize, StorageError> {
        write_events(&self.path, events)
    }
}

/// Reads a JSON array of event records, tagging every event Local whatever the
/// stored `source` says.
pub fn read_events(path: &Path) -> Result<Vec<Event>, StorageError> {
    let content = std::fs::read_to_string(path)?;
    let document: serde_json::Value = serde_json::from_str(&content)?;

    let serde_json::Value::Array(items) = document else {
        return Err(StorageError::NotAnArray);
    };

    let events = items
        .into_iter()
        .filter(|item| item.is_object())
        .filter_map(|item| {
            let parsed = serde_json::from_value::<EventRecord>(item)
                .map_err(|e| e.to_string())
                .and_then(|record| Event::from_record(record).map_err(|e| e.to_string()));
            match parsed {
                Ok(event) => Some(event.with_source(EventSource::Local)),
                Err(e) => {
                    tracing::warn!("Skipping unreadable event record in {}: {}", path.display(), e);
                    None
                }
            }
        })
        .collect();

    Ok(events)
}

/// Writes only valid events; invalid ones are dropped with a log line.
pub fn write_events<'a>(
    path: &Path,
    events: impl IntoIterator<Item = &'a Event>,
) -> Result<usize, StorageError> {
    let records: Vec<EventRecord> = events
        .into_iter()
        .filter(|event| {
            if !event.is_valid() {
                tracing::warn!("Not persisting invalid event '{}'", event.id());
            }
            event.is_valid()
        })
        .map(Event::to_record)
        .collect();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(&records)?;
    std::fs::write(path, content)?;

    tracing::debug!("Wrote {} events to {}", records.len(), path.display());
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::Color;
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 10)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn standup() -> Event {
        Event::with_id("e1", "Standup", at(9, 0), at(9, 30))
            .with_color(Color::parse("#3399ff").unwrap())
    }

    #[test]
    fn saved_events_reload_identically() {
        let dir = TempDir::new().unwrap();
        let file = EventFile::new(dir.path().join("events.json"));
        let event = standup();

        file.save([&event]).unwrap();
        let reloaded = file.load();

        assert_eq!(reloaded, vec![event]);
    }

    #[test]
    fn load_tags_every_record_local() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(
            &path,
            r#"[{"id":"s1","title":"Synced","start":"2025-01-10T09:00","end":"2025-01-10T10:00","source":1}]"#,
        )
        .unwrap();

        let events = EventFile::new(&path).load();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].source, EventSource::Local);
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        let file = EventFile::new(dir.path().join("absent.json"));

        assert!(file.load().is_empty());
    }

    #[test]
    fn corrupt_file_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, "{ not json").unwrap();

        let file = EventFile::new(&path);

        assert!(file.load().is_empty());
        assert!(file.try_load().is_err());
    }

    #[test]
    fn object_document_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(&path, r#"{"events": []}"#).unwrap();

        let result = read_events(&path);

        assert!(matches!(result, Err(StorageError::NotAnArray)));
    }

    #[test]
    fn unreadable_records_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        std::fs::write(
            &path,
            r#"[
                {"id":"ok","title":"Fine","start":"2025-01-10T09:00","end":"2025-01-10T10:00"},
                {"id":"bad","title":"Broken","start":"soon","end":"later"},
                42
            ]"#,
        )
        .unwrap();

        let events = read_events(&path).unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id(), "ok");
    }

    #[test]
    fn invalid_events_are_not_written() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.json");
        let untitled = Event::with_id("e2", "", at(10, 0), at(11, 0));

        let written = write_events(&path, [&standup(), &untitled]).unwrap();

        assert_eq!(written, 1);
        assert_eq!(read_events(&path).unwrap().len(), 1);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let file = EventFile::new(dir.path().join("nested").join("events.json"));

        file.save([&standup()]).unwrap();

        assert!(file.path().exists());
    }
}
