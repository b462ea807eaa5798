use std::future::Future;

use super::{make_record, make_routed_record, Check};
use crate::record::{HistoryFilter, HistoryOutcome};
use crate::HistoryStore;

pub(super) async fn run_query_tests<S, F, Fut>(factory: &F) -> Vec<Check>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(Check::new(
        "query",
        "empty_store_lists_nothing",
        empty_store_lists_nothing(factory).await,
    ));
    results.push(Check::new(
        "query",
        "newest_first",
        newest_first(factory).await,
    ));
    results.push(Check::new(
        "query",
        "filter_by_forms",
        filter_by_forms(factory).await,
    ));
    results.push(Check::new(
        "query",
        "filter_by_outcome",
        filter_by_outcome(factory).await,
    ));
    results.push(Check::new(
        "query",
        "limit_truncates_after_ordering",
        limit_truncates_after_ordering(factory).await,
    ));

    results
}

// ── Test implementations ──────────────────────────────────────────────────────

async fn empty_store_lists_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let all = s
        .list(&HistoryFilter::default())
        .await
        .map_err(|e| e.to_string())?;
    if !all.is_empty() {
        return Err(format!("expected empty list, got {} entries", all.len()));
    }
    Ok(())
}

async fn newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for (id, at) in [
        ("mid", "2025-02-01T00:00:00Z"),
        ("old", "2025-01-01T00:00:00Z"),
        ("new", "2025-03-01T00:00:00Z"),
    ] {
        s.append(make_record(id, at)).await.map_err(|e| e.to_string())?;
    }
    let ids: Vec<String> = s
        .list(&HistoryFilter::default())
        .await
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|e| e.record.id)
        .collect();
    if ids != ["new", "mid", "old"] {
        return Err(format!("expected [new, mid, old], got {:?}", ids));
    }
    Ok(())
}

async fn filter_by_forms<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for record in [
        make_routed_record("r1", "intake", "referral", HistoryOutcome::Ok),
        make_routed_record("r2", "intake", "claim", HistoryOutcome::Ok),
        make_routed_record("r3", "claim", "referral", HistoryOutcome::Ok),
    ] {
        s.append(record).await.map_err(|e| e.to_string())?;
    }

    let from_intake = s
        .list(&HistoryFilter {
            source_form_id: Some("intake".to_string()),
            ..Default::default()
        })
        .await
        .map_err(|e| e.to_string())?;
    if from_intake.len() != 2 {
        return Err(format!("expected 2 from intake, got {}", from_intake.len()));
    }

    let intake_to_referral = s
        .list(&HistoryFilter {
            source_form_id: Some("intake".to_string()),
            target_form_id: Some("referral".to_string()),
            ..Default::default()
        })
        .await
        .map_err(|e| e.to_string())?;
    if intake_to_referral.len() != 1 || intake_to_referral[0].record.id != "r1" {
        return Err(format!(
            "expected only r1 for intake->referral, got {:?}",
            intake_to_referral
                .iter()
                .map(|e| e.record.id.as_str())
                .collect::<Vec<_>>()
        ));
    }
    Ok(())
}

async fn filter_by_outcome<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for record in [
        make_routed_record("r1", "a", "b", HistoryOutcome::Ok),
        make_routed_record("r2", "a", "b", HistoryOutcome::Failed),
        make_routed_record("r3", "a", "b", HistoryOutcome::Partial),
        make_routed_record("r4", "a", "b", HistoryOutcome::Failed),
    ] {
        s.append(record).await.map_err(|e| e.to_string())?;
    }
    let failed = s
        .list(&HistoryFilter {
            outcome: Some(HistoryOutcome::Failed),
            ..Default::default()
        })
        .await
        .map_err(|e| e.to_string())?;
    if failed.len() != 2 || failed.iter().any(|e| e.record.outcome != HistoryOutcome::Failed) {
        return Err(format!("expected 2 failed entries, got {}", failed.len()));
    }
    Ok(())
}

async fn limit_truncates_after_ordering<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for (id, at) in [
        ("d1", "2025-01-01T00:00:00Z"),
        ("d3", "2025-01-03T00:00:00Z"),
        ("d2", "2025-01-02T00:00:00Z"),
    ] {
        s.append(make_record(id, at)).await.map_err(|e| e.to_string())?;
    }
    let top = s
        .list(&HistoryFilter {
            limit: 2,
            ..Default::default()
        })
        .await
        .map_err(|e| e.to_string())?;
    let ids: Vec<&str> = top.iter().map(|e| e.record.id.as_str()).collect();
    if ids != ["d3", "d2"] {
        return Err(format!("expected [d3, d2], got {:?}", ids));
    }
    Ok(())
}
