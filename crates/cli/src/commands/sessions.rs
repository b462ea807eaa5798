use serde::Serialize;

use formtrans_history::report::usage_report;
use formtrans_history::{HistoryFilter, HistoryStore};
use time::format_description::well_known::Rfc3339;
use time::Duration;

use crate::commands::open_history;
use crate::settings::Settings;
use crate::{print_json, OutputFormat};

#[derive(Serialize)]
struct SessionView {
    start: String,
    end: String,
    minutes: i64,
    translations: usize,
}

#[derive(Serialize)]
struct SessionsView {
    unique_days: Vec<String>,
    sessions: Vec<SessionView>,
    unparsed: usize,
}

pub(crate) async fn cmd_sessions(
    settings: &Settings,
    gap_minutes: u32,
    output: OutputFormat,
) -> Result<(), String> {
    if gap_minutes == 0 {
        return Err("--gap-minutes must be positive".to_string());
    }
    let store = open_history(settings).await?;
    let records: Vec<_> = store
        .list(&HistoryFilter::default())
        .await
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(|entry| entry.record)
        .collect();

    let report = usage_report(&records, Duration::minutes(i64::from(gap_minutes)));
    let view = SessionsView {
        unique_days: report.unique_days,
        sessions: report
            .sessions
            .iter()
            .map(|s| SessionView {
                start: s.start.format(&Rfc3339).unwrap_or_default(),
                end: s.end.format(&Rfc3339).unwrap_or_default(),
                minutes: s.duration().whole_minutes(),
                translations: s.translations,
            })
            .collect(),
        unparsed: report.unparsed,
    };

    match output {
        OutputFormat::Json => print_json(&view),
        OutputFormat::Text => {
            println!("unique days: {}", view.unique_days.len());
            for day in &view.unique_days {
                println!("  {}", day);
            }
            println!("sessions: {}", view.sessions.len());
            for session in &view.sessions {
                println!(
                    "  {} .. {}  {} min, {} translations",
                    session.start, session.end, session.minutes, session.translations
                );
            }
            if view.unparsed > 0 {
                println!("skipped {} records with unreadable timestamps", view.unparsed);
            }
            Ok(())
        }
    }
}
