use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::calendar::{Color, Event, EventSource};

/// Local and server collections, keyed by event id. An id lives in at most one
/// of them; every mutation below keeps it that way.
#[derive(Debug, Clone, Default)]
pub struct EventStore {
    local: HashMap<String, Event>,
    server: HashMap<String, Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_local(events: impl IntoIterator<Item = Event>) -> Self {
        let mut store = Self::new();
        store.reset_local(events);
        store
    }

    /// Swaps in a fresh local collection, e.g. one re-read from disk. Ids the
    /// server owns are still refused.
    pub fn reset_local(&mut self, events: impl IntoIterator<Item = Event>) {
        self.local.clear();
        for event in events {
            self.add_local(event);
        }
    }

    pub fn add_local(&mut self, event: Event) -> bool {
        if self.server.contains_key(event.id()) {
            tracing::warn!("Refusing local copy of server-owned event {}", event.id());
            return false;
        }
        let event = event.with_source(EventSource::Local);
        self.local.insert(event.id().to_string(), event);
        true
    }

    pub fn add_server(&mut self, event: Event) {
        if self.local.remove(event.id()).is_some() {
            tracing::debug!("Server copy of {} replaces the local one", event.id());
        }
        let event = event.with_source(EventSource::Server);
        self.server.insert(event.id().to_string(), event);
    }

    pub fn remove_local(&mut self, id: &str) -> Option<Event> {
        self.local.remove(id)
    }

    pub fn remove_server(&mut self, id: &str) -> Option<Event> {
        self.server.remove(id)
    }

    pub fn replace_local(&mut self, id: &str, event: Event) -> bool {
        if event.id() != id || !self.local.contains_key(id) {
            return false;
        }
        self.local
            .insert(id.to_string(), event.with_source(EventSource::Local));
        true
    }

    pub fn replace_server(&mut self, id: &str, event: Event) -> bool {
        if event.id() != id || !self.server.contains_key(id) {
            return false;
        }
        self.server
            .insert(id.to_string(), event.with_source(EventSource::Server));
        true
    }

    /// Drops the whole server collection and repopulates it; local copies of
    /// the incoming ids are left for the merge step to evict.
    pub fn reset_server(&mut self, events: impl IntoIterator<Item = Event>) {
        self.server = events
            .into_iter()
            .map(|event| {
                let event = event.with_source(EventSource::Server);
                (event.id().to_string(), event)
            })
            .collect();
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        self.local.get(id).or_else(|| self.server.get(id))
    }

    pub fn contains_server(&self, id: &str) -> bool {
        self.server.contains_key(id)
    }

    pub fn local_events(&self) -> impl Iterator<Item = &Event> {
        self.local.values()
    }

    pub fn server_events(&self) -> impl Iterator<Item = &Event> {
        self.server.values()
    }

    pub fn local_len(&self) -> usize {
        self.local.len()
    }

    pub fn server_len(&self) -> usize {
        self.server.len()
    }

    pub fn events_on(&self, date: NaiveDate, include_server: bool) -> Vec<&Event> {
        let server = include_server
            .then(|| self.server.values())
            .into_iter()
            .flatten();

        let mut events: Vec<&Event> = self
            .local
            .values()
            .chain(server)
            .filter(|event| event.date() == date)
            .collect();
        events.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id().cmp(b.id())));
        events
    }

    /// Owned copy of both collections, so a reminder tick never observes a
    /// half-replaced server collection.
    pub fn snapshot(&self) -> Vec<Event> {
        self.local
            .values()
            .chain(self.server.values())
            .cloned()
            .collect()
    }

    pub fn highlighted_dates(&self, include_server: bool) -> BTreeMap<NaiveDate, Color> {
        let server = include_server
            .then(|| self.server.values())
            .into_iter()
            .flatten();

        let mut earliest: BTreeMap<NaiveDate, &Event> = BTreeMap::new();
        for event in self.local.values().chain(server) {
            earliest
                .entry(event.date())
                .and_modify(|current| {
                    if (event.start, event.id()) < (current.start, current.id()) {
                        *current = event;
                    }
                })
                .or_insert(event);
        }

        earliest
            .into_iter()
            .map(|(date, event)| (date, event.color.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn event(id: &str, day: u32, hour: u32) -> Event {
        Event::with_id(id, format!("Event {}", id), at(day, hour), at(day, hour + 1))
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    #[test]
    fn add_local_tags_event_as_local() {
        let mut store = EventStore::new();

        store.add_local(event("e1", 10, 9).with_source(EventSource::Server));

        assert_eq!(store.get("e1").unwrap().source, EventSource::Local);
    }

    #[test]
    fn add_local_refuses_server_owned_id() {
        let mut store = EventStore::new();
        store.add_server(event("e1", 10, 9));

        let added = store.add_local(event("e1", 10, 9));

        assert!(!added);
        assert_eq!(store.local_len(), 0);
    }

    #[test]
    fn add_server_evicts_local_duplicate() {
        let mut store = EventStore::new();
        store.add_local(event("e1", 10, 9));

        store.add_server(event("e1", 10, 9));

        assert_eq!(store.local_len(), 0);
        assert_eq!(store.server_len(), 1);
        assert_eq!(store.get("e1").unwrap().source, EventSource::Server);
    }

    #[test]
    fn remove_missing_id_is_noop() {
        let mut store = EventStore::new();
        store.add_local(event("e1", 10, 9));

        assert!(store.remove_local("missing").is_none());
        assert!(store.remove_server("e1").is_none());
        assert_eq!(store.local_len(), 1);
    }

    #[test]
    fn replace_local_requires_existing_id() {
        let mut store = EventStore::new();

        let replaced = store.replace_local("e1", event("e1", 10, 9));

        assert!(!replaced);
        assert_eq!(store.local_len(), 0);
    }

    #[test]
    fn replace_local_rejects_mismatched_id() {
        let mut store = EventStore::new();
        store.add_local(event("e1", 10, 9));

        let replaced = store.replace_local("e1", event("e2", 10, 9));

        assert!(!replaced);
        assert!(store.get("e2").is_none());
    }

    #[test]
    fn replace_server_swaps_content() {
        let mut store = EventStore::new();
        store.add_server(event("s1", 10, 9));
        let mut updated = event("s1", 10, 9);
        updated.title = "Renamed".to_string();

        assert!(store.replace_server("s1", updated));
        assert_eq!(store.get("s1").unwrap().title, "Renamed");
    }

    #[test]
    fn events_on_orders_by_start() {
        let mut store = EventStore::new();
        store.add_local(event("late", 10, 15));
        store.add_local(event("early", 10, 8));
        store.add_local(event("other_day", 11, 9));

        let ids: Vec<&str> = store.events_on(date(10), false).iter().map(|e| e.id()).collect();

        assert_eq!(ids, vec!["early", "late"]);
    }

    #[test]
    fn events_on_hides_server_events_when_asked() {
        let mut store = EventStore::new();
        store.add_local(event("l1", 10, 9));
        store.add_server(event("s1", 10, 10));

        assert_eq!(store.events_on(date(10), false).len(), 1);
        assert_eq!(store.events_on(date(10), true).len(), 2);
    }

    #[test]
    fn reset_server_discards_previous_collection() {
        let mut store = EventStore::new();
        store.add_server(event("old", 10, 9));

        store.reset_server(vec![event("new", 10, 9)]);

        assert!(store.get("old").is_none());
        assert_eq!(store.get("new").unwrap().source, EventSource::Server);
    }

    #[test]
    fn reset_local_replaces_collection_but_keeps_server_ids() {
        let mut store = EventStore::with_local(vec![event("old", 10, 9)]);
        store.add_server(event("s1", 10, 14));

        store.reset_local(vec![event("new", 10, 11), event("s1", 10, 14)]);

        assert!(store.get("old").is_none());
        assert_eq!(store.get("new").unwrap().source, EventSource::Local);
        assert_eq!(store.local_len(), 1);
        assert!(store.contains_server("s1"));
    }

    #[test]
    fn snapshot_contains_both_collections() {
        let mut store = EventStore::new();
        store.add_local(event("l1", 10, 9));
        store.add_server(event("s1", 10, 10));

        let mut ids: Vec<String> = store.snapshot().iter().map(|e| e.id().to_string()).collect();
        ids.sort();

        assert_eq!(ids, vec!["l1", "s1"]);
    }

    #[test]
    fn highlighted_dates_use_earliest_event_color() {
        let mut store = EventStore::new();
        store.add_local(event("late", 10, 15).with_color(Color::parse("#ff0000").unwrap()));
        store.add_local(event("early", 10, 8).with_color(Color::parse("#00ff00").unwrap()));
        store.add_server(event("s1", 12, 9).with_color(Color::parse("#123456").unwrap()));

        let local_only = store.highlighted_dates(false);
        let all = store.highlighted_dates(true);

        assert_eq!(local_only.len(), 1);
        assert_eq!(local_only[&date(10)].as_str(), "#00ff00");
        assert_eq!(all[&date(12)].as_str(), "#123456");
    }
}
