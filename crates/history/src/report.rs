//! Usage report over history records: unique days and user sessions.
//!
//! Records closer together than the session gap are treated as one user
//! session; a gap at or above the threshold starts a new one.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime};

use crate::record::HistoryRecord;

/// Default gap separating two sessions.
pub const DEFAULT_SESSION_GAP: Duration = Duration::minutes(60);

/// One inferred user session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub translations: usize,
}

impl Session {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageReport {
    /// Distinct UTC calendar days with at least one record, ascending.
    pub unique_days: Vec<String>,
    /// Sessions in chronological order.
    pub sessions: Vec<Session>,
    /// Records whose timestamp could not be parsed (excluded above).
    pub unparsed: usize,
}

/// Build a usage report from records in any order.
pub fn usage_report(records: &[HistoryRecord], gap: Duration) -> UsageReport {
    let mut times: Vec<OffsetDateTime> = Vec::with_capacity(records.len());
    let mut unparsed = 0;
    for record in records {
        match parse_timestamp(&record.recorded_at) {
            Some(t) => times.push(t),
            None => unparsed += 1,
        }
    }
    times.sort();

    let mut days: Vec<Date> = times.iter().map(|t| t.date()).collect();
    days.dedup();

    let mut sessions: Vec<Session> = Vec::new();
    for t in times {
        match sessions.last_mut() {
            Some(current) if t - current.end < gap => {
                current.end = t;
                current.translations += 1;
            }
            _ => sessions.push(Session {
                start: t,
                end: t,
                translations: 1,
            }),
        }
    }

    UsageReport {
        unique_days: days.into_iter().map(|d| d.to_string()).collect(),
        sessions,
        unparsed,
    }
}

/// Parse a record timestamp.
///
/// RFC 3339 is what this crate writes. Older sheet exports used
/// `MM/DD/YYYY HH:MM:SS`, `MM/DD/YYYY`, `YYYY-MM-DD HH:MM:SS`, or
/// `YYYY-MM-DD`; those are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(t) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(t.to_offset(time::UtcOffset::UTC));
    }

    let us_datetime = format_description!("[month]/[day]/[year] [hour]:[minute]:[second]");
    let iso_datetime = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    for format in [us_datetime, iso_datetime] {
        if let Ok(t) = PrimitiveDateTime::parse(raw, format) {
            return Some(t.assume_utc());
        }
    }

    let us_date = format_description!("[month]/[day]/[year]");
    let iso_date = format_description!("[year]-[month]-[day]");
    for format in [us_date, iso_date] {
        if let Ok(d) = Date::parse(raw, format) {
            return Some(d.midnight().assume_utc());
        }
    }
    None
}
