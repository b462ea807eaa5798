use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{HistoryEntry, HistoryFilter, HistoryRecord, StarDelta};

/// The storage trait for translation history backends.
///
/// History is append-only: a record is written once by [`append`] and never
/// changed or removed through this trait. Star ratings are kept as a separate
/// tally keyed by record id, so rating a translation never rewrites its
/// record.
///
/// ## Concurrency
///
/// Many translations append concurrently. Each `append` must be atomic and
/// independent of every other: no lost writes, no duplicated writes, no torn
/// records. Implementations must be `Send + Sync + 'static` so one store can
/// be shared through an `Arc` across tasks.
///
/// [`append`]: HistoryStore::append
#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
    /// Append one record.
    ///
    /// Returns `Err(StorageError::DuplicateRecord)` if a record with the same
    /// id already exists.
    async fn append(&self, record: HistoryRecord) -> Result<(), StorageError>;

    /// Read one record with its star tally.
    ///
    /// Returns `Err(StorageError::RecordNotFound)` if the id is unknown.
    async fn get(&self, record_id: &str) -> Result<HistoryEntry, StorageError>;

    /// List records matching `filter`, most stars first, then newest first.
    async fn list(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, StorageError>;

    /// Change a record's star tally by one and return the new count.
    /// The count never drops below zero.
    ///
    /// Returns `Err(StorageError::RecordNotFound)` if the id is unknown.
    async fn star(&self, record_id: &str, delta: StarDelta) -> Result<u32, StorageError>;
}

#[async_trait]
impl<T: HistoryStore + ?Sized> HistoryStore for std::sync::Arc<T> {
    async fn append(&self, record: HistoryRecord) -> Result<(), StorageError> {
        (**self).append(record).await
    }

    async fn get(&self, record_id: &str) -> Result<HistoryEntry, StorageError> {
        (**self).get(record_id).await
    }

    async fn list(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, StorageError> {
        (**self).list(filter).await
    }

    async fn star(&self, record_id: &str, delta: StarDelta) -> Result<u32, StorageError> {
        (**self).star(record_id, delta).await
    }
}
