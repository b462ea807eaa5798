use std::future::Future;

use super::{make_record, Check};
use crate::record::HistoryOutcome;
use crate::{HistoryStore, StorageError};

pub(super) async fn run_append_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(Check::new(
        "append",
        "appended_record_is_readable",
        appended_record_is_readable(factory).await,
    ));
    results.push(Check::new(
        "append",
        "record_stored_unchanged",
        record_stored_unchanged(factory).await,
    ));
    results.push(Check::new(
        "append",
        "duplicate_id_rejected",
        duplicate_id_rejected(factory).await,
    ));
    results.push(Check::new(
        "append",
        "duplicate_does_not_overwrite",
        duplicate_does_not_overwrite(factory).await,
    ));
    results.push(Check::new(
        "append",
        "get_unknown_returns_not_found",
        get_unknown_returns_not_found(factory).await,
    ));
    results.push(Check::new(
        "append",
        "failed_attempt_is_recorded",
        failed_attempt_is_recorded(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn appended_record_is_readable<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append(make_record("r1", "2025-01-01T00:00:00Z"))
        .await
        .map_err(|e| e.to_string())?;
    let entry = s.get("r1").await.map_err(|e| e.to_string())?;
    if entry.record.id != "r1" {
        return Err(format!("expected id r1, got {}", entry.record.id));
    }
    if entry.stars != 0 {
        return Err(format!("new record should have 0 stars, got {}", entry.stars));
    }
    Ok(())
}

/// Every field of the record round-trips through the backend.
async fn record_stored_unchanged<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut record = make_record("r1", "2025-01-01T00:00:00Z");
    record.outcome = HistoryOutcome::Partial;
    record.warning_count = 2;
    record.fields = serde_json::json!({"name": "Jo", "age": null});
    s.append(record.clone()).await.map_err(|e| e.to_string())?;

    let stored = s.get("r1").await.map_err(|e| e.to_string())?.record;
    if stored != record {
        return Err(format!("stored record differs: {:?} vs {:?}", stored, record));
    }
    Ok(())
}

async fn duplicate_id_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append(make_record("r1", "2025-01-01T00:00:00Z"))
        .await
        .map_err(|e| e.to_string())?;
    match s.append(make_record("r1", "2025-01-02T00:00:00Z")).await {
        Err(StorageError::DuplicateRecord { record_id }) if record_id == "r1" => Ok(()),
        Err(e) => Err(format!("expected DuplicateRecord, got {e}")),
        Ok(()) => Err("expected DuplicateRecord, append succeeded".to_string()),
    }
}

async fn duplicate_does_not_overwrite<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.append(make_record("r1", "2025-01-01T00:00:00Z"))
        .await
        .map_err(|e| e.to_string())?;
    let _ = s.append(make_record("r1", "2025-01-02T00:00:00Z")).await;

    let stored = s.get("r1").await.map_err(|e| e.to_string())?.record;
    if stored.recorded_at != "2025-01-01T00:00:00Z" {
        return Err(format!(
            "original record was overwritten: recorded_at = {}",
            stored.recorded_at
        ));
    }
    let all = s
        .list(&Default::default())
        .await
        .map_err(|e| e.to_string())?;
    if all.len() != 1 {
        return Err(format!("expected 1 record, got {}", all.len()));
    }
    Ok(())
}

async fn get_unknown_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get("nope").await {
        Err(StorageError::RecordNotFound { record_id }) if record_id == "nope" => Ok(()),
        Err(e) => Err(format!("expected RecordNotFound, got {e}")),
        Ok(_) => Err("expected RecordNotFound, got a record".to_string()),
    }
}

/// Failed attempts carry an error and an empty field map.
async fn failed_attempt_is_recorded<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut record = make_record("r1", "2025-01-01T00:00:00Z");
    record.outcome = HistoryOutcome::Failed;
    record.fields = serde_json::json!({});
    record.error = Some("model response malformed".to_string());
    s.append(record).await.map_err(|e| e.to_string())?;

    let stored = s.get("r1").await.map_err(|e| e.to_string())?.record;
    if stored.outcome != HistoryOutcome::Failed {
        return Err(format!("expected failed outcome, got {}", stored.outcome));
    }
    if stored.error.as_deref() != Some("model response malformed") {
        return Err(format!("error not preserved: {:?}", stored.error));
    }
    Ok(())
}
