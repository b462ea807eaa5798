//! In-process history backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{select, HistoryEntry, HistoryFilter, HistoryRecord, StarDelta};
use crate::traits::HistoryStore;

/// Records plus star tallies; also the fold target of the JSON-lines log.
#[derive(Debug, Default)]
pub(crate) struct HistoryState {
    records: Vec<HistoryRecord>,
    index: HashMap<String, usize>,
    stars: HashMap<String, u32>,
}

impl HistoryState {
    pub(crate) fn insert(&mut self, record: HistoryRecord) -> Result<(), StorageError> {
        if self.index.contains_key(&record.id) {
            return Err(StorageError::DuplicateRecord {
                record_id: record.id,
            });
        }
        self.index.insert(record.id.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    pub(crate) fn entry(&self, record_id: &str) -> Option<HistoryEntry> {
        let idx = *self.index.get(record_id)?;
        Some(HistoryEntry {
            record: self.records[idx].clone(),
            stars: self.stars.get(record_id).copied().unwrap_or(0),
        })
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = HistoryEntry> + '_ {
        self.records.iter().map(|r| HistoryEntry {
            record: r.clone(),
            stars: self.stars.get(&r.id).copied().unwrap_or(0),
        })
    }

    /// Current tally for a known record.
    pub(crate) fn stars(&self, record_id: &str) -> Result<u32, StorageError> {
        if !self.index.contains_key(record_id) {
            return Err(StorageError::RecordNotFound {
                record_id: record_id.to_string(),
            });
        }
        Ok(self.stars.get(record_id).copied().unwrap_or(0))
    }

    /// Overwrite the tally for a known record.
    pub(crate) fn set_stars(&mut self, record_id: &str, count: u32) {
        self.stars.insert(record_id.to_string(), count);
    }

    pub(crate) fn star(&mut self, record_id: &str, delta: StarDelta) -> Result<u32, StorageError> {
        let count = delta.apply(self.stars(record_id)?);
        self.set_stars(record_id, count);
        Ok(count)
    }
}

/// History kept in memory behind a mutex. Lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    state: Mutex<HistoryState>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record in append order.
    pub fn records(&self) -> Vec<HistoryRecord> {
        self.state
            .lock()
            .map(|s| s.records.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HistoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::Unavailable("history lock poisoned".to_string()))
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, record: HistoryRecord) -> Result<(), StorageError> {
        self.lock()?.insert(record)
    }

    async fn get(&self, record_id: &str) -> Result<HistoryEntry, StorageError> {
        self.lock()?
            .entry(record_id)
            .ok_or_else(|| StorageError::RecordNotFound {
                record_id: record_id.to_string(),
            })
    }

    async fn list(&self, filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, StorageError> {
        let state = self.lock()?;
        Ok(select(state.entries(), filter))
    }

    async fn star(&self, record_id: &str, delta: StarDelta) -> Result<u32, StorageError> {
        self.lock()?.star(record_id, delta)
    }
}
