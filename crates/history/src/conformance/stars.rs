use std::future::Future;

use super::{make_record, Check};
use crate::record::{HistoryFilter, StarDelta};
use crate::{HistoryStore, StorageError};

pub(super) async fn run_star_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(Check::new(
        "stars",
        "star_up_and_down",
        star_up_and_down(factory).await,
    ));
    results.push(Check::new(
        "stars",
        "star_floor_is_zero",
        star_floor_is_zero(factory).await,
    ));
    results.push(Check::new(
        "stars",
        "star_unknown_returns_not_found",
        star_unknown_returns_not_found(factory).await,
    ));
    results.push(Check::new(
        "stars",
        "starred_records_list_first",
        starred_records_list_first(factory).await,
    ));
    results.push(Check::new(
        "stars",
        "star_leaves_record_unchanged",
        star_leaves_record_unchanged(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn star_up_and_down<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append(make_record("r1", "2025-01-01T00:00:00Z"))
        .await
        .map_err(|e| e.to_string())?;

    let mut counts = Vec::new();
    for delta in [StarDelta::Up, StarDelta::Up, StarDelta::Down] {
        counts.push(s.star("r1", delta).await.map_err(|e| e.to_string())?);
    }
    if counts != [1, 2, 1] {
        return Err(format!("expected tallies [1, 2, 1], got {:?}", counts));
    }
    let entry = s.get("r1").await.map_err(|e| e.to_string())?;
    if entry.stars != 1 {
        return Err(format!("expected 1 star on read, got {}", entry.stars));
    }
    Ok(())
}

async fn star_floor_is_zero<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append(make_record("r1", "2025-01-01T00:00:00Z"))
        .await
        .map_err(|e| e.to_string())?;
    let count = s
        .star("r1", StarDelta::Down)
        .await
        .map_err(|e| e.to_string())?;
    if count != 0 {
        return Err(format!("expected 0 after down from 0, got {count}"));
    }
    Ok(())
}

async fn star_unknown_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.star("ghost", StarDelta::Up).await {
        Err(StorageError::RecordNotFound { .. }) => Ok(()),
        Err(e) => Err(format!("expected RecordNotFound, got {e}")),
        Ok(n) => Err(format!("expected RecordNotFound, got tally {n}")),
    }
}

/// A starred older record outranks newer unstarred ones.
async fn starred_records_list_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append(make_record("old", "2025-01-01T00:00:00Z"))
        .await
        .map_err(|e| e.to_string())?;
    s.append(make_record("new", "2025-06-01T00:00:00Z"))
        .await
        .map_err(|e| e.to_string())?;
    s.star("old", StarDelta::Up)
        .await
        .map_err(|e| e.to_string())?;

    let ids: Vec<String> = s
        .list(&HistoryFilter::default())
        .await
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|e| e.record.id)
        .collect();
    if ids != ["old", "new"] {
        return Err(format!("expected [old, new], got {:?}", ids));
    }
    Ok(())
}

async fn star_leaves_record_unchanged<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let record = make_record("r1", "2025-01-01T00:00:00Z");
    s.append(record.clone()).await.map_err(|e| e.to_string())?;
    s.star("r1", StarDelta::Up)
        .await
        .map_err(|e| e.to_string())?;
    let stored = s.get("r1").await.map_err(|e| e.to_string())?.record;
    if stored != record {
        return Err("starring modified the record".to_string());
    }
    Ok(())
}
