//! Behavioural checks shared by every `HistoryStore` backend.
//!
//! A backend passes a factory that yields a fresh, empty store; each check
//! gets its own. Checks are grouped as append, query, stars and concurrent.
//!
//! ```ignore
//! let report = run_conformance_suite(|| async { MyStore::connect().await }).await;
//! assert!(report.is_clean(), "{report}");
//! ```

mod append;
mod concurrent;
mod query;
mod stars;

use std::fmt;
use std::future::Future;

use crate::record::{HistoryOutcome, HistoryRecord};
use crate::HistoryStore;

/// One named check and, when it did not hold, why.
#[derive(Debug, Clone)]
pub struct Check {
    pub group: &'static str,
    pub name: &'static str,
    pub failure: Option<String>,
}

impl Check {
    fn new(group: &'static str, name: &'static str, outcome: Result<(), String>) -> Self {
        Self {
            group,
            name,
            failure: outcome.err(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConformanceReport {
    pub checks: Vec<Check>,
}

impl ConformanceReport {
    pub fn failures(&self) -> impl Iterator<Item = &Check> {
        self.checks.iter().filter(|c| !c.passed())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

// Lists only the failures; a clean run is a single line.
impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.failures().count();
        writeln!(f, "{} of {} history store checks failed", failed, self.checks.len())?;
        for check in self.failures() {
            writeln!(
                f,
                "  {}::{}: {}",
                check.group,
                check.name,
                check.failure.as_deref().unwrap_or_default()
            )?;
        }
        Ok(())
    }
}

/// Run every check against stores made by `factory`.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: HistoryStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut checks = append::run_append_tests(&factory).await;
    checks.extend(query::run_query_tests(&factory).await);
    checks.extend(stars::run_star_tests(&factory).await);
    checks.extend(concurrent::run_concurrent_tests(&factory).await);
    ConformanceReport { checks }
}

// Record builders shared by the check groups.

fn make_record(id: &str, recorded_at: &str) -> HistoryRecord {
    HistoryRecord {
        id: id.to_string(),
        request_id: format!("req-{id}"),
        recorded_at: recorded_at.to_string(),
        source_form_id: "intake".to_string(),
        target_form_id: "referral".to_string(),
        source_text: "Jo Smith, 30, jo@example.com".to_string(),
        fields: serde_json::json!({"name": "Jo Smith", "age": 30, "email": "jo@example.com"}),
        outcome: HistoryOutcome::Ok,
        error: None,
        warning_count: 0,
        prompt_digest: Some("00ff".to_string()),
    }
}

fn make_routed_record(
    id: &str,
    source_form_id: &str,
    target_form_id: &str,
    outcome: HistoryOutcome,
) -> HistoryRecord {
    HistoryRecord {
        source_form_id: source_form_id.to_string(),
        target_form_id: target_form_id.to_string(),
        outcome,
        ..make_record(id, "2025-01-01T00:00:00Z")
    }
}
