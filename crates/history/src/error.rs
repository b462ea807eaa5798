/// All errors that can be returned by a HistoryStore implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// A record with this id was already appended. Records are written once.
    #[error("history record already exists: {record_id}")]
    DuplicateRecord { record_id: String },

    /// No record with the given id.
    #[error("history record not found: {record_id}")]
    RecordNotFound { record_id: String },

    /// The backend could not complete the write or read (I/O, encoding,
    /// lock poisoning, upstream outage).
    #[error("history store unavailable: {0}")]
    Unavailable(String),
}
