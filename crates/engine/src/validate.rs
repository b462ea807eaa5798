//! Result validation: fit a candidate field mapping to the target schema.
//!
//! The target schema is the sole source of truth for shape. Every target
//! field ends up in the result exactly once, in schema order; candidate keys
//! the schema does not name are dropped.

use std::str::FromStr;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{Map, Value};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use formtrans_history::HistoryOutcome;
use formtrans_schema::{FieldSpec, FieldType, FieldValue, FormSchema};

/// Overall validation status of a translation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// Every field present and correctly typed.
    Ok,
    /// Some fields are unknown or were coerced.
    Partial,
    /// The model output could not be read at all. Never produced by
    /// [`validate`]; unreadable output surfaces as `ResponseMalformed`.
    Failed,
}

impl ValidationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationStatus::Ok => "ok",
            ValidationStatus::Partial => "partial",
            ValidationStatus::Failed => "failed",
        }
    }
}

impl From<ValidationStatus> for HistoryOutcome {
    fn from(status: ValidationStatus) -> Self {
        match status {
            ValidationStatus::Ok => HistoryOutcome::Ok,
            ValidationStatus::Partial => HistoryOutcome::Partial,
            ValidationStatus::Failed => HistoryOutcome::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningKind {
    /// The model output had no key for the field.
    Missing,
    /// The model explicitly emitted the unknown marker (or an empty value).
    Unresolved,
    /// The value had the wrong JSON type and was converted.
    Coerced,
    /// The value had the wrong type and could not be converted.
    Uncoercible,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldWarning {
    pub field: String,
    pub kind: WarningKind,
    pub message: String,
}

/// A translated form: exactly the target schema's fields, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationResult {
    pub target_form_id: String,
    pub fields: IndexMap<String, FieldValue>,
    pub status: ValidationStatus,
    pub warnings: Vec<FieldWarning>,
}

impl TranslationResult {
    /// The field mapping as a JSON object (unknown → `null`).
    pub fn fields_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    pub fn unknown_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, v)| v.is_unknown())
            .map(|(k, _)| k.as_str())
    }
}

/// Fit `candidate` to `target`.
pub fn validate(candidate: &Map<String, Value>, target: &FormSchema) -> TranslationResult {
    let mut fields = IndexMap::with_capacity(target.fields().len());
    let mut warnings = Vec::new();

    for spec in target.fields() {
        let value = match candidate.get(&spec.name) {
            None => {
                warnings.push(warning(spec, WarningKind::Missing, "absent from model output"));
                FieldValue::Unknown
            }
            Some(raw) => match conform(spec, raw) {
                Conformed::Exact(v) => v,
                Conformed::Unresolved => {
                    warnings.push(warning(
                        spec,
                        WarningKind::Unresolved,
                        "not derivable from the source text",
                    ));
                    FieldValue::Unknown
                }
                Conformed::Coerced(v, from) => {
                    warnings.push(warning(
                        spec,
                        WarningKind::Coerced,
                        &format!("converted {} to {}", from, spec.field_type),
                    ));
                    v
                }
                Conformed::Failed(reason) => {
                    warnings.push(warning(spec, WarningKind::Uncoercible, &reason));
                    FieldValue::Unknown
                }
            },
        };
        fields.insert(spec.name.clone(), value);
    }

    let dropped = candidate
        .keys()
        .filter(|k| target.field(k).is_none())
        .count();
    if dropped > 0 {
        tracing::debug!(target_form = target.id(), dropped, "discarded keys not in target schema");
    }

    let status = if warnings.is_empty() {
        ValidationStatus::Ok
    } else {
        ValidationStatus::Partial
    };

    TranslationResult {
        target_form_id: target.id().to_string(),
        fields,
        status,
        warnings,
    }
}

fn warning(spec: &FieldSpec, kind: WarningKind, message: &str) -> FieldWarning {
    FieldWarning {
        field: spec.name.clone(),
        kind,
        message: message.to_string(),
    }
}

// ── Conformance and coercion ────────────────────────────────────────

enum Conformed {
    Exact(FieldValue),
    Unresolved,
    /// Converted value and the JSON type it was converted from.
    Coerced(FieldValue, &'static str),
    Failed(String),
}

fn conform(spec: &FieldSpec, raw: &Value) -> Conformed {
    if raw.is_null() {
        return Conformed::Unresolved;
    }
    if let Value::String(s) = raw {
        if s.trim().is_empty() {
            return Conformed::Unresolved;
        }
    }

    match spec.field_type {
        FieldType::Text => match raw {
            Value::String(s) => Conformed::Exact(FieldValue::Text(s.clone())),
            Value::Number(n) => Conformed::Coerced(FieldValue::Text(n.to_string()), "number"),
            Value::Bool(b) => Conformed::Coerced(FieldValue::Text(b.to_string()), "boolean"),
            other => Conformed::Failed(format!("expected text, got {}", json_type(other))),
        },
        FieldType::Number => match raw {
            Value::Number(n) => match parse_decimal(&n.to_string()) {
                Some(d) => Conformed::Exact(FieldValue::Number(d)),
                None => Conformed::Failed(format!("number {} out of range", n)),
            },
            Value::String(s) => match parse_decimal(s) {
                Some(d) => Conformed::Coerced(FieldValue::Number(d), "string"),
                None => Conformed::Failed(format!("'{}' is not a number", s)),
            },
            other => Conformed::Failed(format!("expected number, got {}", json_type(other))),
        },
        FieldType::Date => match raw {
            Value::String(s) => match parse_iso_date(s.trim()) {
                Some(d) => Conformed::Exact(FieldValue::Date(d)),
                None => match parse_other_date(s.trim()) {
                    Some(d) => Conformed::Coerced(FieldValue::Date(d), "non-ISO date string"),
                    None => Conformed::Failed(format!("'{}' is not a date", s)),
                },
            },
            other => Conformed::Failed(format!("expected date string, got {}", json_type(other))),
        },
        FieldType::Boolean => match raw {
            Value::Bool(b) => Conformed::Exact(FieldValue::Boolean(*b)),
            Value::String(s) => match parse_bool(s) {
                Some(b) => Conformed::Coerced(FieldValue::Boolean(b), "string"),
                None => Conformed::Failed(format!("'{}' is not a boolean", s)),
            },
            Value::Number(n) => match n.as_i64() {
                Some(0) => Conformed::Coerced(FieldValue::Boolean(false), "number"),
                Some(1) => Conformed::Coerced(FieldValue::Boolean(true), "number"),
                _ => Conformed::Failed(format!("{} is not a boolean", n)),
            },
            other => Conformed::Failed(format!("expected boolean, got {}", json_type(other))),
        },
        FieldType::Enum => {
            let text = match raw {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                other => {
                    return Conformed::Failed(format!("expected enum value, got {}", json_type(other)))
                }
            };
            if spec.values.iter().any(|v| *v == text) && raw.is_string() {
                return Conformed::Exact(FieldValue::Enum(text));
            }
            let wanted = text.trim();
            match spec.values.iter().find(|v| v.eq_ignore_ascii_case(wanted)) {
                Some(canonical) => Conformed::Coerced(
                    FieldValue::Enum(canonical.clone()),
                    if raw.is_string() { "variant spelling" } else { json_type(raw) },
                ),
                None => Conformed::Failed(format!(
                    "'{}' is not one of: {}",
                    text,
                    spec.values.join(", ")
                )),
            }
        }
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Numeric text to a decimal. Accepts a leading currency symbol, thousands
/// separators, and scientific notation.
fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix(&['$', '€', '£', '¥'][..])
        .unwrap_or(trimmed)
        .trim();
    if trimmed.is_empty() {
        return None;
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
        .map(|d| d.normalize())
}

fn parse_iso_date(raw: &str) -> Option<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]")).ok()
}

fn parse_other_date(raw: &str) -> Option<Date> {
    if let Ok(d) = Date::parse(raw, format_description!("[month padding:none]/[day padding:none]/[year]")) {
        return Some(d);
    }
    OffsetDateTime::parse(raw, &Rfc3339).ok().map(|t| t.date())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}
