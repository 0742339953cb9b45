use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::calendar::{Color, Event, EventDraft, EventSource};
use crate::storage::config::{Config, ConfigError, SyncConfig};
use crate::storage::event_file::{read_events, write_events};
use crate::storage::{EventFile, EventStore, StorageError};
use crate::sync::{merge_download, CycleOutcome, Operation, SyncEngine, SyncError, SyncEvent};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Event needs a title")]
    InvalidEvent,
    #[error("No event with id '{0}'")]
    UnknownEvent(String),
    #[error("Event '{0}' belongs to the server and cannot be changed while offline")]
    Offline(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncStatus {
    Synced,
    Syncing,
    Offline,
    Error(String),
}

pub struct App {
    store: EventStore,
    event_file: EventFile,
    engine: SyncEngine,
    sync_events: UnboundedReceiver<SyncEvent>,
    connected: bool,
    pub sync_status: SyncStatus,
    in_flight: usize,
    unsaved: bool,
    reassigned: HashMap<String, String>,
}

impl App {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let (engine, sync_events) = SyncEngine::new(&config.server, &config.sync)?;
        let event_file = EventFile::new(config.storage.events_file.clone());
        Ok(Self::with_parts(event_file, engine, sync_events))
    }

    pub fn with_parts(
        event_file: EventFile,
        engine: SyncEngine,
        sync_events: UnboundedReceiver<SyncEvent>,
    ) -> Self {
        let mut app = Self {
            store: EventStore::new(),
            event_file,
            engine,
            sync_events,
            connected: false,
            sync_status: SyncStatus::Offline,
            in_flight: 0,
            unsaved: false,
            reassigned: HashMap::new(),
        };
        app.load();
        app
    }

    pub fn load(&mut self) {
        self.store = EventStore::with_local(self.event_file.load());
    }

    /// Picks up whatever other modcal processes wrote to the events file.
    /// Skipped while this process holds changes it failed to write.
    pub fn refresh_local(&mut self) {
        if self.unsaved || !self.event_file.path().exists() {
            return;
        }
        match self.event_file.try_load() {
            Ok(events) => self.store.reset_local(events),
            Err(e) => tracing::warn!("Keeping in-memory events, reload failed: {}", e),
        }
    }

    /// Follows ids the server replaced on create.
    pub fn resolve_id<'a>(&'a self, id: &'a str) -> &'a str {
        self.reassigned.get(id).map_or(id, String::as_str)
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        self.store.get(id)
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn can_reach_server(&self) -> bool {
        self.connected && self.engine.is_connected()
    }

    pub fn events_on(&self, date: NaiveDate) -> Vec<&Event> {
        self.store.events_on(date, self.connected)
    }

    pub fn highlighted_dates(&self) -> BTreeMap<NaiveDate, Color> {
        self.store.highlighted_dates(self.connected)
    }

    /// Everything the reminder loop should consider, server events included
    /// even while offline.
    pub fn reminder_snapshot(&self) -> Vec<Event> {
        self.store.snapshot()
    }

    pub fn create_event(&mut self, draft: EventDraft) -> Result<Event, AppError> {
        let event = Event::from_draft(draft, EventSource::Local);
        if !event.is_valid() {
            return Err(AppError::InvalidEvent);
        }

        if self.can_reach_server() {
            let server_copy = event.clone().with_source(EventSource::Server);
            match self.engine.upload_single(&server_copy) {
                Ok(()) => {
                    self.in_flight += 1;
                    self.store.add_server(server_copy.clone());
                    tracing::info!("Created server event {}", server_copy.id());
                    return Ok(server_copy);
                }
                Err(e) => tracing::warn!("Upload of {} not started: {}", event.id(), e),
            }
        }

        self.refresh_local();
        self.store.add_local(event.clone());
        self.persist();
        tracing::info!("Created local event {}", event.id());
        Ok(event)
    }

    pub fn edit_event(&mut self, id: &str, draft: EventDraft) -> Result<Event, AppError> {
        self.refresh_local();
        let id = self.resolve_id(id).to_string();
        let id = id.as_str();
        let current = self
            .store
            .get(id)
            .ok_or_else(|| AppError::UnknownEvent(id.to_string()))?;
        let revised = current.revised(draft);
        if !revised.is_valid() {
            return Err(AppError::InvalidEvent);
        }

        match revised.source {
            EventSource::Local => {
                self.store.replace_local(id, revised.clone());
                self.persist();
                if self.can_reach_server() {
                    self.track(self.engine.upload_single(&revised));
                }
            }
            EventSource::Server => {
                if !self.can_reach_server() {
                    return Err(AppError::Offline(id.to_string()));
                }
                self.store.replace_server(id, revised.clone());
                self.track(self.engine.update(&revised));
            }
        }

        tracing::info!("Edited event {}", id);
        Ok(revised)
    }

    pub fn delete_event(&mut self, id: &str) -> Result<Event, AppError> {
        self.refresh_local();
        let id = self.resolve_id(id).to_string();
        let id = id.as_str();
        let removed = if let Some(event) = self.store.remove_local(id) {
            self.persist();
            event
        } else if self.store.contains_server(id) {
            if !self.can_reach_server() {
                return Err(AppError::Offline(id.to_string()));
            }
            self.store
                .remove_server(id)
                .ok_or_else(|| AppError::UnknownEvent(id.to_string()))?
        } else {
            return Err(AppError::UnknownEvent(id.to_string()));
        };

        if self.can_reach_server() {
            self.track(self.engine.delete(id));
        }

        tracing::info!("Deleted event {}", id);
        Ok(removed)
    }

    /// Starts a download. Returns false when nothing was dispatched.
    pub fn start_sync(&mut self) -> bool {
        match self.engine.download_events() {
            Ok(()) => {
                self.in_flight += 1;
                self.sync_status = SyncStatus::Syncing;
                true
            }
            Err(SyncError::AlreadySyncing) => {
                tracing::debug!("Sync requested while one is running");
                false
            }
            Err(e) => {
                tracing::error!("Cannot start sync: {}", e);
                self.sync_status = SyncStatus::Error(e.to_string());
                false
            }
        }
    }

    pub fn auto_sync(&mut self, config: &SyncConfig) -> bool {
        if !config.auto {
            return false;
        }
        self.connected = true;
        self.start_sync()
    }

    /// Sends every local event in one request. Returns how many were sent.
    pub fn push_local(&mut self) -> Result<usize, AppError> {
        let local: Vec<Event> = self.store.local_events().cloned().collect();
        let sent = self.engine.upload_all(&local)?;
        if sent > 0 {
            self.in_flight += 1;
        }
        Ok(sent)
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
        self.sync_status = SyncStatus::Offline;
        tracing::info!("Working offline");
    }

    pub fn import_from(&mut self, path: &Path) -> Result<usize, AppError> {
        let imported = read_events(path)?;
        self.refresh_local();
        let mut count = 0;
        for event in imported.into_iter().filter(Event::is_valid) {
            if self.store.add_local(event) {
                count += 1;
            }
        }
        self.persist();
        tracing::info!("Imported {} events from {}", count, path.display());
        Ok(count)
    }

    pub fn export_to(&mut self, path: &Path) -> Result<usize, AppError> {
        self.refresh_local();
        let snapshot = self.store.snapshot();
        let count = write_events(path, &snapshot)?;
        tracing::info!("Exported {} events to {}", count, path.display());
        Ok(count)
    }

    pub async fn next_sync_event(&mut self) -> Option<SyncEvent> {
        self.sync_events.recv().await
    }

    pub fn has_pending(&self) -> bool {
        self.in_flight > 0
    }

    /// Applies sync results until no remote call is in flight.
    pub async fn settle(&mut self) {
        while self.has_pending() {
            match self.sync_events.recv().await {
                Some(event) => self.handle_sync_event(event),
                None => break,
            }
        }
    }

    pub fn handle_sync_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Started => self.sync_status = SyncStatus::Syncing,
            SyncEvent::CycleFinished(outcome) => {
                self.finish_call();
                self.apply_cycle(outcome);
            }
            SyncEvent::OperationFinished {
                operation,
                event_id,
                outcome,
            } => {
                self.finish_call();
                match outcome {
                    Ok(stored_id) => {
                        tracing::info!("{:?} of {:?} confirmed by server", operation, event_id);
                        if operation == Operation::Create
                            && let (Some(sent), Some(stored)) = (event_id, stored_id)
                        {
                            self.adopt_server_copy(&sent, &stored);
                        }
                    }
                    Err(failure) => {
                        self.sync_status = SyncStatus::Error(failure.to_string());
                        if matches!(operation, Operation::Create | Operation::Update)
                            && let Some(id) = event_id
                        {
                            self.keep_locally(&id);
                        }
                    }
                }
            }
        }
    }

    /// Every change is written when it happens; this only retries a write
    /// that failed, so the file is never overwritten with a stale view.
    pub fn shutdown(&mut self) {
        if self.unsaved {
            self.persist();
        }
        tracing::info!("Shut down with {} local events", self.store.local_len());
    }

    fn apply_cycle(&mut self, outcome: CycleOutcome) {
        match outcome {
            CycleOutcome::Succeeded(downloaded) => {
                self.refresh_local();
                merge_download(&mut self.store, downloaded);
                self.persist();
                self.connected = true;
                self.sync_status = SyncStatus::Synced;
            }
            CycleOutcome::Failed(failure) => {
                tracing::error!("Sync failed: {}", failure);
                self.connected = false;
                self.sync_status = SyncStatus::Error(failure.to_string());
            }
            CycleOutcome::Unrecognized => {
                self.sync_status = if self.connected {
                    SyncStatus::Synced
                } else {
                    SyncStatus::Offline
                };
            }
        }
    }

    /// The server accepted a POST and stored the event as `stored`; whatever
    /// copy was sent now lives in the server collection under that id.
    fn adopt_server_copy(&mut self, sent: &str, stored: &str) {
        self.refresh_local();
        if let Some(local) = self.store.remove_local(sent) {
            self.store.add_server(local.reassigned(stored));
            self.persist();
        } else if let Some(server) = self.store.remove_server(sent) {
            self.store.add_server(server.reassigned(stored));
        } else {
            return;
        }

        if sent != stored {
            tracing::info!("Event {} is now {} on the server", sent, stored);
            self.reassigned.insert(sent.to_string(), stored.to_string());
        }
    }

    /// A server copy the server never accepted is demoted to a local event.
    fn keep_locally(&mut self, id: &str) {
        self.refresh_local();
        if let Some(event) = self.store.remove_server(id) {
            tracing::warn!("Keeping {} locally after failed upload", id);
            self.store.add_local(event);
            self.persist();
        }
    }

    fn track(&mut self, dispatched: Result<(), SyncError>) {
        match dispatched {
            Ok(()) => self.in_flight += 1,
            Err(e) => tracing::warn!("Remote call not started: {}", e),
        }
    }

    fn finish_call(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    fn persist(&mut self) {
        match self.event_file.save(self.store.local_events()) {
            Ok(_) => self.unsaved = false,
            Err(e) => {
                tracing::error!("Failed to save local events: {}", e);
                self.unsaved = true;
            }
        }
    }
}
