pub mod conformance;
mod error;
mod jsonl;
mod memory;
mod record;
pub mod report;
mod traits;

pub use error::StorageError;
pub use jsonl::JsonlHistoryStore;
pub use memory::InMemoryHistoryStore;
pub use record::{HistoryEntry, HistoryFilter, HistoryOutcome, HistoryRecord, StarDelta};
pub use traits::HistoryStore;
