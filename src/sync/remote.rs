use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use thiserror::Error;

use crate::calendar::{Event, EventRecord, EventSource};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Request error: {0}")]
    RequestError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("Permission denied")]
    Forbidden,
    #[error("Unrecognized response body: {0}")]
    UnrecognizedBody(String),
}

#[derive(Debug, Serialize)]
struct EventBatch {
    events: Vec<EventRecord>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteCalendar: Send + Sync {
    async fn fetch_events(&self) -> Result<Vec<Event>, ApiError>;

    /// Returns the id the server stored the event under, which may differ
    /// from the one sent.
    async fn create_event(&self, event: &Event) -> Result<String, ApiError>;

    async fn update_event(&self, event: &Event) -> Result<(), ApiError>;

    async fn delete_event(&self, event_id: &str) -> Result<(), ApiError>;

    async fn sync_events(&self, events: &[Event]) -> Result<(), ApiError>;
}

/// Syntactic check only: a positive answer means a request is worth trying,
/// not that the server is reachable.
pub fn is_well_formed_url(url: &str) -> bool {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return false;
    }
    match Url::parse(trimmed) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some()
        }
        Err(_) => false,
    }
}

/// Accepts either a bare JSON array of records or an object carrying an
/// `events` array. Every decoded event is tagged Server.
pub fn parse_event_list(body: &str) -> Result<Vec<Event>, ApiError> {
    let document: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| ApiError::UnrecognizedBody(e.to_string()))?;

    let items = match document {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut object) => match object.remove("events") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(ApiError::UnrecognizedBody(
                    "object without an events array".to_string(),
                ));
            }
        },
        other => {
            return Err(ApiError::UnrecognizedBody(format!(
                "unexpected JSON {}",
                json_kind(&other)
            )));
        }
    };

    let events = items
        .into_iter()
        .filter_map(|item| {
            let record: EventRecord = serde_json::from_value(item)
                .map_err(|e| tracing::warn!("Skipping malformed server record: {}", e))
                .ok()?;
            if record.id.is_empty() {
                tracing::warn!("Skipping server record without an id: '{}'", record.title);
                return None;
            }
            Event::from_record(record)
                .map_err(|e| tracing::warn!("Skipping server event: {}", e))
                .ok()
        })
        .map(|event| event.with_source(EventSource::Server))
        .collect();

    Ok(events)
}

/// Id from a created-event response body, if the server echoed one.
fn assigned_id(body: &str) -> Option<String> {
    let record: EventRecord = serde_json::from_str(body).ok()?;
    Some(record.id).filter(|id| !id.is_empty())
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

pub struct HttpCalendarClient {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl HttpCalendarClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, ApiError> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn events_url(&self) -> String {
        format!("{}/events", self.base_url)
    }

    fn event_url(&self, event_id: &str) -> String {
        format!("{}/events/{}", self.base_url, urlencoding::encode(event_id))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        }
    }

    async fn check_status(response: Response, subject: &str) -> Result<Response, ApiError> {
        let status = response.status();

        if status == StatusCode::FORBIDDEN {
            tracing::error!("Server refused {}: permission denied", subject);
            return Err(ApiError::Forbidden);
        }

        if status == StatusCode::UNAUTHORIZED {
            tracing::error!("Authentication failed for {}", subject);
            return Err(ApiError::AuthenticationFailed);
        }

        if status == StatusCode::NOT_FOUND {
            tracing::error!("Not found: {}", subject);
            return Err(ApiError::NotFound(subject.to_string()));
        }

        if !status.is_success() {
            let body = response.text().await?;
            tracing::error!("Request for {} failed. Status: {}, Body: {}", subject, status, body);
            return Err(ApiError::RequestError(format!("Status {}: {}", status, body)));
        }

        Ok(response)
    }
}

#[async_trait]
impl RemoteCalendar for HttpCalendarClient {
    async fn fetch_events(&self) -> Result<Vec<Event>, ApiError> {
        let url = self.events_url();
        tracing::info!("Downloading events from {}", url);

        let response = self.authorize(self.client.get(&url)).send().await?;
        tracing::info!("Fetch events response status: {}", response.status());

        let response = Self::check_status(response, &url).await?;
        let body = response.text().await?;
        let events = parse_event_list(&body)?;

        tracing::info!("Fetched {} events successfully", events.len());
        Ok(events)
    }

    async fn create_event(&self, event: &Event) -> Result<String, ApiError> {
        let url = self.events_url();
        let record = event.to_record();

        tracing::info!("Creating event: {} on {}", event.title, event.start);
        tracing::debug!("POST {} with payload: {:?}", url, record);

        let response = self
            .authorize(self.client.post(&url))
            .json(&record)
            .send()
            .await?;
        tracing::info!("Create event response status: {}", response.status());

        let response = Self::check_status(response, event.id()).await?;
        let body = response.text().await?;
        let stored_id = assigned_id(&body).unwrap_or_else(|| event.id().to_string());

        if stored_id != event.id() {
            tracing::info!("Event {} created on server as {}", event.id(), stored_id);
        } else {
            tracing::info!("Event {} created successfully", event.id());
        }
        Ok(stored_id)
    }

    async fn update_event(&self, event: &Event) -> Result<(), ApiError> {
        let url = self.event_url(event.id());
        let record = event.to_record();

        tracing::info!("Updating event {}: {}", event.id(), event.title);
        tracing::debug!("PUT {} with payload: {:?}", url, record);

        let response = self
            .authorize(self.client.put(&url))
            .json(&record)
            .send()
            .await?;
        tracing::info!("Update event response status: {}", response.status());

        Self::check_status(response, event.id()).await?;
        tracing::info!("Event {} updated successfully", event.id());
        Ok(())
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), ApiError> {
        let url = self.event_url(event_id);

        let response = self.authorize(self.client.delete(&url)).send().await?;
        tracing::info!("Delete event response status: {}", response.status());

        Self::check_status(response, event_id).await?;
        Ok(())
    }

    async fn sync_events(&self, events: &[Event]) -> Result<(), ApiError> {
        let url = format!("{}/sync", self.events_url());
        let batch = EventBatch {
            events: events.iter().map(Event::to_record).collect(),
        };

        tracing::info!("Uploading {} events to {}", batch.events.len(), url);

        let response = self
            .authorize(self.client.post(&url))
            .json(&batch)
            .send()
            .await?;
        tracing::info!("Bulk upload response status: {}", response.status());

        Self::check_status(response, &url).await?;
        Ok(())
    }
}
