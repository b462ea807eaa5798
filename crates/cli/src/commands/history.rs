use serde_json::json;

use formtrans_history::{HistoryEntry, HistoryFilter, HistoryOutcome, HistoryStore, StarDelta};

use crate::commands::open_history;
use crate::settings::Settings;
use crate::{print_json, OutputFormat};

/// Longest source excerpt shown in text output.
const EXCERPT_CHARS: usize = 48;

pub(crate) async fn cmd_history(
    settings: &Settings,
    source: Option<String>,
    target: Option<String>,
    outcome: Option<&str>,
    limit: usize,
    output: OutputFormat,
) -> Result<(), String> {
    let outcome = outcome
        .map(|o| o.parse::<HistoryOutcome>())
        .transpose()?;
    let filter = HistoryFilter {
        source_form_id: source,
        target_form_id: target,
        outcome,
        limit,
    };
    let store = open_history(settings).await?;
    let entries = store.list(&filter).await.map_err(|e| e.to_string())?;

    match output {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("no translations recorded");
            }
            for entry in &entries {
                println!("{}", render_entry(entry));
            }
            Ok(())
        }
    }
}

pub(crate) async fn cmd_star(
    settings: &Settings,
    record_id: &str,
    down: bool,
    output: OutputFormat,
) -> Result<(), String> {
    let delta = if down { StarDelta::Down } else { StarDelta::Up };
    let store = open_history(settings).await?;
    let stars = store
        .star(record_id, delta)
        .await
        .map_err(|e| e.to_string())?;

    match output {
        OutputFormat::Json => print_json(&json!({ "record_id": record_id, "stars": stars })),
        OutputFormat::Text => {
            println!("{}: {} star{}", record_id, stars, if stars == 1 { "" } else { "s" });
            Ok(())
        }
    }
}

fn render_entry(entry: &HistoryEntry) -> String {
    let record = &entry.record;
    let excerpt: String = record
        .source_text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(EXCERPT_CHARS)
        .collect();
    format!(
        "{}  {}  {} -> {}  {}  *{}  \"{}\"",
        record.id,
        record.recorded_at,
        record.source_form_id,
        record.target_form_id,
        record.outcome,
        entry.stars,
        excerpt
    )
}
