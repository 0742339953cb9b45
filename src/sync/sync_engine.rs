use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::calendar::{Event, EventSource};
use crate::storage::config::{ServerConfig, SyncConfig};
use crate::sync::failure::SyncFailure;
use crate::sync::remote::{is_well_formed_url, ApiError, HttpCalendarClient, RemoteCalendar};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("A download is already in progress")]
    AlreadySyncing,
    #[error("Refusing to send invalid event '{0}'")]
    InvalidEvent(String),
    #[error("Invalid server URL '{0}'")]
    InvalidUrl(String),
    #[error("API error: {0}")]
    ApiError(#[from] ApiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Succeeded(Vec<Event>),
    Failed(SyncFailure),
    /// The server answered but the body was neither a list nor `{events: [...]}`.
    Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
    BulkUpload,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Started,
    CycleFinished(CycleOutcome),
    /// `outcome` carries the id the server stored a created event under;
    /// other operations report `None`.
    OperationFinished {
        operation: Operation,
        event_id: Option<String>,
        outcome: Result<Option<String>, SyncFailure>,
    },
}

/// Talks to the remote authority without blocking the caller. Results arrive
/// as [`SyncEvent`]s on the receiver handed out at construction. Every remote
/// call, download or single-event, waits for the same in-flight slot, so calls
/// reach the server in dispatch order.
pub struct SyncEngine {
    server_url: String,
    remote: Arc<dyn RemoteCalendar>,
    state: Arc<Mutex<SyncState>>,
    slot: Arc<tokio::sync::Mutex<()>>,
    events: UnboundedSender<SyncEvent>,
}

impl SyncEngine {
    pub fn new(
        server: &ServerConfig,
        sync: &SyncConfig,
    ) -> Result<(Self, UnboundedReceiver<SyncEvent>), SyncError> {
        let client = HttpCalendarClient::new(server.url.clone(), server.token.clone())
            .with_timeout(sync.request_timeout())?;
        Ok(Self::with_remote(server.url.clone(), Arc::new(client)))
    }

    pub fn with_remote(
        server_url: impl Into<String>,
        remote: Arc<dyn RemoteCalendar>,
    ) -> (Self, UnboundedReceiver<SyncEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let engine = Self {
            server_url: server_url.into(),
            remote,
            state: Arc::new(Mutex::new(SyncState::Idle)),
            slot: Arc::new(tokio::sync::Mutex::new(())),
            events,
        };
        (engine, receiver)
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn is_connected(&self) -> bool {
        is_well_formed_url(&self.server_url)
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn download_events(&self) -> Result<(), SyncError> {
        self.ensure_connected()?;

        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == SyncState::Syncing {
                return Err(SyncError::AlreadySyncing);
            }
            *state = SyncState::Syncing;
        }
        self.emit(SyncEvent::Started);

        let remote = Arc::clone(&self.remote);
        let state = Arc::clone(&self.state);
        let slot = Arc::clone(&self.slot);
        let events = self.events.clone();

        tokio::spawn(async move {
            let _in_flight = slot.lock().await;

            let outcome = match remote.fetch_events().await {
                Ok(downloaded) => {
                    tracing::info!("Download finished with {} events", downloaded.len());
                    CycleOutcome::Succeeded(downloaded)
                }
                Err(ApiError::UnrecognizedBody(detail)) => {
                    tracing::warn!("Ignoring download with unrecognized body: {}", detail);
                    CycleOutcome::Unrecognized
                }
                Err(e) => {
                    tracing::error!("Download failed: {}", e);
                    CycleOutcome::Failed(SyncFailure::from(e))
                }
            };

            *state.lock().unwrap_or_else(PoisonError::into_inner) = match outcome {
                CycleOutcome::Succeeded(_) => SyncState::Succeeded,
                CycleOutcome::Failed(_) => SyncState::Failed,
                CycleOutcome::Unrecognized => SyncState::Idle,
            };

            if events.send(SyncEvent::CycleFinished(outcome)).is_err() {
                tracing::debug!("Sync listener gone before download finished");
            }
        });

        Ok(())
    }

    pub fn upload_single(&self, event: &Event) -> Result<(), SyncError> {
        Self::ensure_valid(event)?;
        let event = event.clone();
        let event_id = event.id().to_string();
        self.dispatch(Operation::Create, Some(event_id), move |remote| async move {
            remote.create_event(&event).await.map(Some)
        })
    }

    pub fn update(&self, event: &Event) -> Result<(), SyncError> {
        Self::ensure_valid(event)?;
        let event = event.clone();
        let event_id = event.id().to_string();
        self.dispatch(Operation::Update, Some(event_id), move |remote| async move {
            remote.update_event(&event).await.map(|()| None)
        })
    }

    pub fn delete(&self, event_id: &str) -> Result<(), SyncError> {
        if event_id.is_empty() {
            return Err(SyncError::InvalidEvent(String::new()));
        }
        let id = event_id.to_string();
        self.dispatch(Operation::Delete, Some(id.clone()), move |remote| async move {
            remote.delete_event(&id).await.map(|()| None)
        })
    }

    /// Sends every valid local event in one request. Returns how many were
    /// sent; nothing is dispatched when there is nothing to send.
    pub fn upload_all(&self, events: &[Event]) -> Result<usize, SyncError> {
        let batch: Vec<Event> = events
            .iter()
            .filter(|event| event.source == EventSource::Local && event.is_valid())
            .cloned()
            .collect();

        if batch.is_empty() {
            return Ok(0);
        }

        let count = batch.len();
        self.dispatch(Operation::BulkUpload, None, move |remote| async move {
            remote.sync_events(&batch).await.map(|()| None)
        })?;
        Ok(count)
    }

    fn dispatch<F, Fut>(
        &self,
        operation: Operation,
        event_id: Option<String>,
        call: F,
    ) -> Result<(), SyncError>
    where
        F: FnOnce(Arc<dyn RemoteCalendar>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<String>, ApiError>> + Send + 'static,
    {
        self.ensure_connected()?;

        let remote = Arc::clone(&self.remote);
        let slot = Arc::clone(&self.slot);
        let events = self.events.clone();

        tokio::spawn(async move {
            let _in_flight = slot.lock().await;

            let outcome = call(remote).await.map_err(|e| {
                tracing::error!("{:?} of {:?} failed: {}", operation, event_id, e);
                SyncFailure::from(e)
            });

            let message = SyncEvent::OperationFinished {
                operation,
                event_id,
                outcome,
            };
            if events.send(message).is_err() {
                tracing::debug!("Sync listener gone before {:?} finished", operation);
            }
        });

        Ok(())
    }

    fn ensure_connected(&self) -> Result<(), SyncError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(SyncError::InvalidUrl(self.server_url.clone()))
        }
    }

    fn ensure_valid(event: &Event) -> Result<(), SyncError> {
        if event.is_valid() {
            Ok(())
        } else {
            tracing::warn!("Not uploading invalid event '{}'", event.id());
            Err(SyncError::InvalidEvent(event.id().to_string()))
        }
    }

    fn emit(&self, message: SyncEvent) {
        if self.events.send(message).is_err() {
            tracing::debug!("Sync listener gone");
        }
    }
}
