pub mod config;
pub mod dismissed;
pub mod event_file;
pub mod event_store;

pub use config::Config;
pub use dismissed::DismissedFile;
pub use event_file::{EventFile, StorageError};
pub use event_store::EventStore;
