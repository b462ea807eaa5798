//! Deserialization of the registry transport format.
//!
//! The entry point is [`forms_from_json`], which accepts either
//! `{"forms": [...]}` or a bare array of form objects. Each form carries an
//! ordered `fields` array; field order in the document is field order in the
//! resulting [`FormSchema`].

use crate::types::{FieldSpec, FieldType, FormSchema, SchemaError};

/// Parse every form in a registry document.
pub fn forms_from_json(doc: &serde_json::Value) -> Result<Vec<FormSchema>, SchemaError> {
    let forms = match doc {
        serde_json::Value::Array(arr) => arr,
        serde_json::Value::Object(obj) => obj
            .get("forms")
            .and_then(|f| f.as_array())
            .ok_or_else(|| SchemaError::InvalidDocument("missing 'forms' array".to_string()))?,
        _ => {
            return Err(SchemaError::InvalidDocument(
                "expected an object or an array".to_string(),
            ))
        }
    };

    forms.iter().map(form_from_json).collect()
}

/// Parse a single form object.
pub fn form_from_json(obj: &serde_json::Value) -> Result<FormSchema, SchemaError> {
    let id = required_str(obj, "id", "form")?;

    let fields_arr = obj
        .get("fields")
        .and_then(|f| f.as_array())
        .ok_or_else(|| {
            SchemaError::InvalidDocument(format!("form '{}': missing 'fields' array", id))
        })?;

    let fields = fields_arr
        .iter()
        .map(|f| parse_field(&id, f))
        .collect::<Result<Vec<_>, _>>()?;

    let mut schema = FormSchema::new(id, fields)?;
    if let Some(name) = optional_str(obj, "name") {
        schema = schema.with_name(name);
    }
    if let Some(description) = optional_str(obj, "description") {
        schema = schema.with_description(description);
    }
    if let Some(category) = optional_str(obj, "category") {
        schema = schema.with_category(category);
    }
    Ok(schema)
}

// ── Parsing helpers ─────────────────────────────────────────────────

fn parse_field(form_id: &str, obj: &serde_json::Value) -> Result<FieldSpec, SchemaError> {
    let name = required_str(obj, "name", &format!("form '{}' field", form_id))?;
    let tag = required_str(obj, "type", &format!("form '{}' field '{}'", form_id, name))?;
    let field_type = FieldType::from_tag(&tag).ok_or_else(|| SchemaError::UnknownType {
        form_id: form_id.to_string(),
        field: name.clone(),
        tag: tag.clone(),
    })?;

    let values = match obj.get("values") {
        None | Some(serde_json::Value::Null) => Vec::new(),
        Some(serde_json::Value::Array(arr)) => arr
            .iter()
            .map(|v| {
                v.as_str().map(|s| s.to_string()).ok_or_else(|| {
                    SchemaError::InvalidDocument(format!(
                        "form '{}' field '{}': allowed values must be strings",
                        form_id, name
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
        Some(_) => {
            return Err(SchemaError::InvalidDocument(format!(
                "form '{}' field '{}': 'values' must be an array",
                form_id, name
            )))
        }
    };

    Ok(FieldSpec {
        name,
        field_type,
        values,
        description: optional_str(obj, "description"),
        example: optional_str(obj, "example"),
    })
}

fn required_str(obj: &serde_json::Value, field: &str, context: &str) -> Result<String, SchemaError> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| SchemaError::InvalidDocument(format!("{}: missing '{}' field", context, field)))
}

fn optional_str(obj: &serde_json::Value, field: &str) -> Option<String> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
}
