use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::report::parse_timestamp;

/// How a translation attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryOutcome {
    /// Every target field was derived without warnings.
    Ok,
    /// A result was produced, but some fields are unknown or were coerced.
    Partial,
    /// No result was produced (schema, model, or parse failure).
    Failed,
    /// The caller abandoned the attempt before the model answered.
    Cancelled,
}

impl HistoryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryOutcome::Ok => "ok",
            HistoryOutcome::Partial => "partial",
            HistoryOutcome::Failed => "failed",
            HistoryOutcome::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for HistoryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" => Ok(HistoryOutcome::Ok),
            "partial" => Ok(HistoryOutcome::Partial),
            "failed" => Ok(HistoryOutcome::Failed),
            "cancelled" | "canceled" => Ok(HistoryOutcome::Cancelled),
            other => Err(format!(
                "unknown outcome '{}' (expected ok, partial, failed, or cancelled)",
                other
            )),
        }
    }
}

/// Immutable audit entry for one translation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Unique per attempt.
    pub id: String,
    /// Caller-supplied or generated request id, for correlation.
    pub request_id: String,
    /// ISO 8601 / RFC 3339 timestamp string (UTC).
    pub recorded_at: String,
    pub source_form_id: String,
    pub target_form_id: String,
    pub source_text: String,
    /// Target field name -> JSON value (`null` for unknown). Empty object
    /// when the attempt produced no result.
    pub fields: serde_json::Value,
    pub outcome: HistoryOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub warning_count: usize,
    /// Hex SHA-256 of the prompt sent to the model, when one was built.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_digest: Option<String>,
}

/// A record as seen by readers: the immutable record plus its star tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub record: HistoryRecord,
    pub stars: u32,
}

/// Direction of a star rating change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarDelta {
    Up,
    Down,
}

impl StarDelta {
    /// Apply to a tally, never going below zero.
    pub fn apply(self, stars: u32) -> u32 {
        match self {
            StarDelta::Up => stars.saturating_add(1),
            StarDelta::Down => stars.saturating_sub(1),
        }
    }
}

/// Selection criteria for [`crate::HistoryStore::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub source_form_id: Option<String>,
    pub target_form_id: Option<String>,
    pub outcome: Option<HistoryOutcome>,
    /// Maximum number of entries (0 = no limit).
    pub limit: usize,
}

impl HistoryFilter {
    pub fn matches(&self, record: &HistoryRecord) -> bool {
        self.source_form_id
            .as_deref()
            .map_or(true, |s| s == record.source_form_id)
            && self
                .target_form_id
                .as_deref()
                .map_or(true, |t| t == record.target_form_id)
            && self.outcome.map_or(true, |o| o == record.outcome)
    }
}

/// Filter, order, and truncate entries the way every backend must.
///
/// Ordering: most stars first, then newest first, then record id.
pub(crate) fn select(entries: impl IntoIterator<Item = HistoryEntry>, filter: &HistoryFilter) -> Vec<HistoryEntry> {
    let mut selected: Vec<HistoryEntry> = entries
        .into_iter()
        .filter(|e| filter.matches(&e.record))
        .collect();
    selected.sort_by(compare_entries);
    if filter.limit > 0 {
        selected.truncate(filter.limit);
    }
    selected
}

fn compare_entries(a: &HistoryEntry, b: &HistoryEntry) -> Ordering {
    b.stars
        .cmp(&a.stars)
        .then_with(|| {
            let ta = parse_timestamp(&a.record.recorded_at);
            let tb = parse_timestamp(&b.record.recorded_at);
            // Unparseable timestamps sort last.
            tb.cmp(&ta)
        })
        .then_with(|| a.record.id.cmp(&b.record.id))
}
