//! JSON-lines history backend.
//!
//! The log holds one JSON object per line, tagged by `kind`:
//!
//! ```text
//! {"kind":"record","id":"…","request_id":"…",…}
//! {"kind":"star","record_id":"…","stars":2}
//! ```
//!
//! The file is folded into memory on open. Every write appends exactly one
//! whole line while holding the store's async mutex, so concurrent appends
//! from tasks sharing the store never interleave.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::memory::HistoryState;
use crate::record::{select, HistoryEntry, HistoryFilter, HistoryRecord, StarDelta};
use crate::traits::HistoryStore;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum LogLine {
    Record(HistoryRecord),
    Star { record_id: String, stars: u32 },
}

/// History persisted to an append-only JSON-lines file.
#[derive(Debug)]
pub struct JsonlHistoryStore {
    path: PathBuf,
    state: Mutex<HistoryState>,
}

impl JsonlHistoryStore {
    /// Open (or lazily create) the log at `path`, replaying existing lines.
    ///
    /// Lines that fail to parse are skipped with a warning so one torn line
    /// does not make the whole history unreadable.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let mut state = HistoryState::default();

        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(StorageError::Unavailable(format!(
                    "reading '{}': {}",
                    path.display(),
                    e
                )))
            }
        };

        let mut skipped = 0usize;
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let applied = match serde_json::from_str::<LogLine>(line) {
                Ok(LogLine::Record(record)) => state.insert(record).is_ok(),
                Ok(LogLine::Star { record_id, stars }) => {
                    let known = state.stars(&record_id).is_ok();
                    if known {
                        state.set_stars(&record_id, stars);
                    }
                    known
                }
                Err(_) => false,
            };
            if !applied {
                skipped += 1;
                tracing::warn!(path = %path.display(), line = lineno + 1, "skipping unreadable history line");
            }
        }
        tracing::debug!(path = %path.display(), skipped, "opened history log");

        let store = Self {
            path,
            state: Mutex::new(state),
        };
        // A crash mid-write leaves a tail without its newline; close it off so
        // the next line starts fresh instead of being glued onto the fragment.
        if !raw.is_empty() && !raw.ends_with('\n') {
            store.write_bytes(b"\n").await?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn write_line(&self, line: &LogLine) -> Result<(), StorageError> {
        let mut bytes = serde_json::to_vec(line)
            .map_err(|e| StorageError::Unavailable(format!("encoding history line: {}", e)))?;
        bytes.push(b'\n');
        self.write_bytes(&bytes).await
    }

    async fn write_bytes(&self, bytes: &[u8]) -> Result<(), StorageError> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                StorageError::Unavailable(format!("opening '{}': {}", self.path.display(), e))
            })?;
        file.write_all(bytes).await.map_err(|e| {
            StorageError::Unavailable(format!("writing '{}': {}", self.path.display(), e))
        })?;
        file.flush().await.map_err(|e| {
            StorageError::Unavailable(format!("flushing '{}': {}", self.path.display(), e))
        })
    }
}

#[async_trait]
impl HistoryStore for JsonlHistoryStore {
    async fn append(&self, record: HistoryRecord) -> Result<(), StorageError> {
        let mut state = self.state.lock().await;
        if state.entry(&record.id).is_some() {
            return Err(StorageError::DuplicateRecord {
                record_id: record.id,
            });
        }
        let line = LogLine::Record(record);
        self.write_line(&line).await?;
        if let LogLine::Record(record) = line {
            state.insert(record)?;
        }
        Ok(())
    }

    async fn get(&self, record_id: &str) -> Result<HistoryEntry, StorageError> {
        self.state
            .lock()
            .await
            .entry(record_id)
            .ok_or_else(|| StorageError::RecordNotFound {
                record_id: record_id.to_string(),
            })
    }

    async fn list(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, StorageError> {
        let state = self.state.lock().await;
        Ok(select(state.entries(), filter))
    }

    async fn star(&self, record_id: &str, delta: StarDelta) -> Result<u32, StorageError> {
        let mut state = self.state.lock().await;
        let current = state.stars(record_id)?;
        let next = delta.apply(current);
        if next != current {
            self.write_line(&LogLine::Star {
                record_id: record_id.to_string(),
                stars: next,
            })
            .await?;
            state.set_stars(record_id, next);
        }
        Ok(next)
    }
}
