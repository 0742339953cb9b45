pub mod color;
pub mod event;
pub mod record;

pub use color::Color;
pub use event::{Event, EventDraft, EventError, EventSource};
pub use record::EventRecord;
