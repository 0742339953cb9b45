use crate::calendar::Event;
use crate::storage::EventStore;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MergeReport {
    pub server_events: usize,
    pub evicted_local: Vec<String>,
}

/// Server copies win unconditionally on id collision. There is no field-level
/// comparison: a local event survives only while its id is unknown to the server.
pub fn merge_download(store: &mut EventStore, downloaded: Vec<Event>) -> MergeReport {
    store.reset_server(downloaded);
    let evicted_local = evict_superseded_local(store);

    let report = MergeReport {
        server_events: store.server_len(),
        evicted_local,
    };
    tracing::info!(
        "Merged download: {} server events, {} local copies superseded",
        report.server_events,
        report.evicted_local.len()
    );
    report
}

pub fn evict_superseded_local(store: &mut EventStore) -> Vec<String> {
    let mut superseded: Vec<String> = store
        .local_events()
        .filter(|event| store.contains_server(event.id()))
        .map(|event| event.id().to_string())
        .collect();
    superseded.sort();

    for id in &superseded {
        store.remove_local(id);
    }
    superseded
}
