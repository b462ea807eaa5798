use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use super::{make_record, Check};
use crate::record::{HistoryFilter, StarDelta};
use crate::{HistoryStore, StorageError};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 16;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(Check::new(
        "concurrent",
        "concurrent_appends_none_lost",
        concurrent_appends_none_lost(factory).await,
    ));
    results.push(Check::new(
        "concurrent",
        "concurrent_duplicate_exactly_one_wins",
        concurrent_duplicate_exactly_one_wins(factory).await,
    ));
    results.push(Check::new(
        "concurrent",
        "concurrent_stars_all_counted",
        concurrent_stars_all_counted(factory).await,
    ));

    results
}

// ── Concurrent appends: no lost or duplicated writes ────────────────────────

/// N tasks append N distinct records in parallel. Every record must be
/// present exactly once afterwards.
async fn concurrent_appends_none_lost<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            s.append(make_record(&format!("r{i}"), "2025-01-01T00:00:00Z"))
                .await
        }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
    }

    let all = storage
        .list(&HistoryFilter::default())
        .await
        .map_err(|e| e.to_string())?;
    if all.len() != N {
        return Err(format!("expected {N} records, got {}", all.len()));
    }
    let ids: HashSet<&str> = all.iter().map(|e| e.record.id.as_str()).collect();
    if ids.len() != N {
        return Err(format!("expected {N} distinct ids, got {}", ids.len()));
    }
    Ok(())
}

// ── Concurrent duplicate: exactly one wins ──────────────────────────────────

/// N tasks race to append a record with the same id. Exactly one append
/// succeeds; the rest must get DuplicateRecord.
async fn concurrent_duplicate_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            match s.append(make_record("same", "2025-01-01T00:00:00Z")).await {
                Ok(()) => Ok(true),
                Err(StorageError::DuplicateRecord { .. }) => Ok(false),
                Err(e) => Err(e),
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }
    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    Ok(())
}

// ── Concurrent stars: every increment counted ───────────────────────────────

async fn concurrent_stars_all_counted<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    storage
        .append(make_record("r1", "2025-01-01T00:00:00Z"))
        .await
        .map_err(|e| e.to_string())?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move { s.star("r1", StarDelta::Up).await }));
    }
    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
    }

    let entry = storage.get("r1").await.map_err(|e| e.to_string())?;
    if entry.stars as usize != N {
        return Err(format!("expected {N} stars, got {}", entry.stars));
    }
    Ok(())
}
