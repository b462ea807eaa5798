//! Reading the candidate field mapping out of a model response.

use serde_json::{Map, Value};

use formtrans_schema::FormSchema;

use crate::llm::ModelResponse;

/// Strip markdown code fences (```json ... ``` or ``` ... ```) if present.
pub(crate) fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();

    if let Some(stripped) = trimmed.strip_prefix("```json") {
        if let Some(inner) = stripped.strip_suffix("```") {
            return inner.trim();
        }
    }
    if let Some(stripped) = trimmed.strip_prefix("```") {
        if let Some(inner) = stripped.strip_suffix("```") {
            return inner.trim();
        }
    }

    trimmed
}

/// Extract the candidate object from a model response.
///
/// Err carries a human-readable reason; the engine reports it as
/// `ResponseMalformed`.
pub(crate) fn candidate_object(
    response: ModelResponse,
    target: &FormSchema,
) -> Result<Map<String, Value>, String> {
    let value = match response {
        ModelResponse::Structured(value) => value,
        ModelResponse::Text(text) => parse_text(&text)?,
    };
    match value {
        Value::Object(map) => Ok(unwrap_envelope(map, target)),
        other => Err(format!("expected a JSON object, got {}", kind(&other))),
    }
}

fn parse_text(text: &str) -> Result<Value, String> {
    let body = strip_code_fences(text);
    if body.is_empty() {
        return Err("empty response".to_string());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(value) => Ok(value),
        Err(first_error) => embedded_object(body)
            .ok_or_else(|| format!("failed to parse JSON: {}", first_error)),
    }
}

/// Prose around the object: take the first `{` that starts a complete JSON
/// object. Braces in the prose itself are skipped over.
fn embedded_object(body: &str) -> Option<Value> {
    body.match_indices('{').find_map(|(start, _)| {
        let mut stream = serde_json::Deserializer::from_str(&body[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value @ Value::Object(_))) => Some(value),
            _ => None,
        }
    })
}

/// Some models wrap the mapping as `{"fields": {...}}`. Unwrap that only
/// when `fields` is not itself a target field.
fn unwrap_envelope(mut map: Map<String, Value>, target: &FormSchema) -> Map<String, Value> {
    if map.len() == 1 && target.field("fields").is_none() {
        if let Some(Value::Object(_)) = map.get("fields") {
            if let Some(Value::Object(inner)) = map.remove("fields") {
                return inner;
            }
        }
    }
    map
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
