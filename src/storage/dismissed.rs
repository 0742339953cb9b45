use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::calendar::record::{format_timestamp, parse_timestamp};
use crate::storage::event_file::StorageError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct DismissedBucket {
    items: HashMap<String, String>,
}

/// Reminder dismissals keyed by event id, shared between the watcher and
/// one-shot `--dismiss` invocations.
#[derive(Debug, Clone)]
pub struct DismissedFile {
    path: PathBuf,
}

impl DismissedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> HashMap<String, NaiveDateTime> {
        if !self.path.exists() {
            return HashMap::new();
        }
        match self.try_load() {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Could not load dismissals from {}: {}", self.path.display(), e);
                HashMap::new()
            }
        }
    }

    pub fn try_load(&self) -> Result<HashMap<String, NaiveDateTime>, StorageError> {
        let content = std::fs::read_to_string(&self.path)?;
        let bucket: DismissedBucket = serde_json::from_str(&content)?;

        Ok(bucket
            .items
            .into_iter()
            .filter_map(|(id, raw)| parse_timestamp(&raw).map(|at| (id, at)))
            .collect())
    }

    pub fn save(&self, dismissed: &HashMap<String, NaiveDateTime>) -> Result<(), StorageError> {
        let bucket = DismissedBucket {
            items: dismissed
                .iter()
                .map(|(id, at)| (id.clone(), format_timestamp(at)))
                .collect(),
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&bucket)?)?;
        Ok(())
    }

    pub fn record(&self, event_id: &str, at: NaiveDateTime) -> Result<(), StorageError> {
        let mut dismissed = self.load();
        dismissed.insert(event_id.to_string(), at);
        self.save(&dismissed)
    }
}
