//! Typed structs for form schemas and the values their fields hold.
//!
//! A [`FormSchema`] is immutable once constructed. The only way to build one
//! is [`FormSchema::new`], which enforces field-name uniqueness and the enum
//! declaration rules, so every schema handed out by a registry is valid.

use std::collections::HashSet;
use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use time::macros::format_description;
use time::Date;

/// Errors raised while constructing a schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("form id must not be empty")]
    EmptyFormId,

    #[error("form '{form_id}': field name at position {position} is empty")]
    EmptyFieldName { form_id: String, position: usize },

    #[error("form '{form_id}': duplicate field name '{field}'")]
    DuplicateField { form_id: String, field: String },

    #[error("form '{form_id}': enum field '{field}' declares no allowed values")]
    EmptyEnum { form_id: String, field: String },

    #[error("form '{form_id}': field '{field}' of type {field_type} cannot declare allowed values")]
    UnexpectedValues {
        form_id: String,
        field: String,
        field_type: FieldType,
    },

    #[error("form '{form_id}': field '{field}' has unknown type '{tag}'")]
    UnknownType {
        form_id: String,
        field: String,
        tag: String,
    },

    #[error("invalid schema document: {0}")]
    InvalidDocument(String),
}

// ── Field types ─────────────────────────────────────────────────────

/// Semantic type of a form field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Date,
    Enum,
    Boolean,
}

impl FieldType {
    /// Parse a transport type tag. Tags are case-insensitive and accept
    /// a few common aliases.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "text" | "string" => Some(FieldType::Text),
            "number" | "numeric" => Some(FieldType::Number),
            "date" => Some(FieldType::Date),
            "enum" | "choice" => Some(FieldType::Enum),
            "boolean" | "bool" => Some(FieldType::Boolean),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Date => "date",
            FieldType::Enum => "enum",
            FieldType::Boolean => "boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Field spec ──────────────────────────────────────────────────────

/// One named, typed field of a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Allowed values. Non-empty for `enum`, empty for every other type.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            values: Vec::new(),
            description: None,
            example: None,
        }
    }

    /// Shorthand for an enum field with its allowed values.
    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            ..Self::new(name, FieldType::Enum)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }
}

// ── Form schema ─────────────────────────────────────────────────────

/// A named, ordered set of typed fields defining one form's structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSchema {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    fields: Vec<FieldSpec>,
}

impl FormSchema {
    /// Build a validated schema. Field order is preserved as given.
    pub fn new(id: impl Into<String>, fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(SchemaError::EmptyFormId);
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for (position, field) in fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(SchemaError::EmptyFieldName {
                    form_id: id,
                    position,
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    form_id: id.clone(),
                    field: field.name.clone(),
                });
            }
            match (field.field_type, field.values.is_empty()) {
                (FieldType::Enum, true) => {
                    return Err(SchemaError::EmptyEnum {
                        form_id: id.clone(),
                        field: field.name.clone(),
                    })
                }
                (FieldType::Enum, false) | (_, true) => {}
                (other, false) => {
                    return Err(SchemaError::UnexpectedValues {
                        form_id: id.clone(),
                        field: field.name.clone(),
                        field_type: other,
                    })
                }
            }
        }

        Ok(Self {
            id,
            name: None,
            description: None,
            category: None,
            fields,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Display name, falling back to the id.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// Registry listing entry for one form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormSummary {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub field_count: usize,
}

impl From<&FormSchema> for FormSummary {
    fn from(schema: &FormSchema) -> Self {
        Self {
            id: schema.id.clone(),
            name: schema.display_name().to_string(),
            description: schema.description.clone(),
            category: schema.category.clone(),
            field_count: schema.fields.len(),
        }
    }
}

// ── Field values ────────────────────────────────────────────────────

/// A value held by a field of a translated form.
///
/// `Unknown` is the explicit marker for a field that could not be derived
/// from the source text. It serializes as JSON `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Number(Decimal),
    Date(Date),
    Enum(String),
    Boolean(bool),
    Unknown,
}

impl FieldValue {
    pub fn is_unknown(&self) -> bool {
        matches!(self, FieldValue::Unknown)
    }

    /// The JSON representation used on the wire and in history records.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            FieldValue::Text(s) | FieldValue::Enum(s) => serde_json::Value::String(s.clone()),
            FieldValue::Number(d) => decimal_to_json(d),
            FieldValue::Date(d) => serde_json::Value::String(format_date(*d)),
            FieldValue::Boolean(b) => serde_json::Value::Bool(*b),
            FieldValue::Unknown => serde_json::Value::Null,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) | FieldValue::Enum(s) => f.write_str(s),
            FieldValue::Number(d) => write!(f, "{}", d.normalize()),
            FieldValue::Date(d) => f.write_str(&format_date(*d)),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Unknown => f.write_str("<unknown>"),
        }
    }
}

/// Format a date as `YYYY-MM-DD`.
pub fn format_date(date: Date) -> String {
    let format = format_description!("[year]-[month]-[day]");
    date.format(format)
        .unwrap_or_else(|_| format!("{}-{:02}-{:02}", date.year(), u8::from(date.month()), date.day()))
}

fn decimal_to_json(d: &Decimal) -> serde_json::Value {
    let d = d.normalize();
    if d.scale() == 0 {
        if let Some(i) = d.to_i64() {
            return serde_json::Value::from(i);
        }
    }
    d.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(d.to_string()))
}
