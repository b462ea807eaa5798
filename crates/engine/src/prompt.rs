//! Deterministic prompt construction.
//!
//! The same (source schema, target schema, source text, preamble) always
//! yields byte-identical output: fields are emitted in schema order, and
//! nothing time- or hash-dependent is included.

use sha2::{Digest, Sha256};

use formtrans_schema::{FieldSpec, FieldType, FormSchema};

use crate::llm::Message;

const DEFAULT_PREAMBLE: &str = "You translate content written for one form into the fields of another form. \
Read the source text, work out what each target field asks for, and carry the matching information over, \
adapting wording and format to the target field while preserving meaning. Never invent information that \
is not present in the source text.";

const RESPONSE_RULES: &str = r#"Response rules:
- Respond with a single JSON object and nothing else. No markdown fences, no commentary.
- Use exactly the target field names as keys, one key per target field. Do not add other keys.
- text: a JSON string.
- number: a JSON number, without units or currency symbols.
- date: a JSON string in YYYY-MM-DD format.
- boolean: true or false.
- enum: one of the listed values, spelled exactly as listed.
- If a field's value cannot be derived from the source text, use null."#;

pub(crate) const SOURCE_OPEN: &str = "<<<SOURCE_TEXT";
pub(crate) const SOURCE_CLOSE: &str = "SOURCE_TEXT>>>";

/// The instruction payload for one translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// System and user messages, in that order.
    pub fn messages(&self) -> Vec<Message> {
        vec![
            Message {
                role: "system".to_string(),
                content: self.system.clone(),
            },
            Message {
                role: "user".to_string(),
                content: self.user.clone(),
            },
        ]
    }

    /// Hex SHA-256 over both messages. Stable for identical prompts.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.system.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.user.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

/// Builds prompts. Holds only immutable configuration.
#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    preamble: Option<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the opening paragraph of the system prompt.
    pub fn with_preamble(preamble: Option<String>) -> Self {
        Self {
            preamble: preamble.filter(|p| !p.trim().is_empty()),
        }
    }

    pub fn build(&self, source: &FormSchema, target: &FormSchema, source_text: &str) -> Prompt {
        let preamble = self.preamble.as_deref().unwrap_or(DEFAULT_PREAMBLE);
        let system = format!("{}\n\n{}", preamble.trim(), RESPONSE_RULES);
        Prompt {
            system,
            user: build_user_message(source, target, source_text),
        }
    }
}

fn build_user_message(source: &FormSchema, target: &FormSchema, source_text: &str) -> String {
    let mut out = String::new();

    // Source section: context only.
    out.push_str(&form_header("Source form", source));
    out.push_str("Source fields:\n");
    if source.fields().is_empty() {
        out.push_str("(none declared)\n");
    }
    for field in source.fields() {
        out.push_str("- ");
        out.push_str(&describe_field(field));
        out.push('\n');
    }
    out.push('\n');

    // Target section: the contract for the response.
    out.push_str(&form_header("Target form", target));
    out.push_str("Target fields (one value each, in this order):\n");
    for (i, field) in target.fields().iter().enumerate() {
        out.push_str(&format!("{}. {}\n", i + 1, describe_field(field)));
    }
    out.push('\n');

    out.push_str("Source text, verbatim between the markers:\n");
    out.push_str(SOURCE_OPEN);
    out.push('\n');
    out.push_str(source_text);
    out.push('\n');
    out.push_str(SOURCE_CLOSE);
    out.push_str("\n\n");

    let keys = target
        .fields()
        .iter()
        .map(|f| format!("\"{}\"", f.name))
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!(
        "Return one JSON object with exactly these {} keys: {}. \
Emit one value per target field, and use null for any field whose value cannot be derived from the source text.",
        target.fields().len(),
        keys
    ));

    out
}

fn form_header(label: &str, form: &FormSchema) -> String {
    let mut header = format!("{}: {} (id: {})\n", label, form.display_name(), form.id());
    if let Some(description) = form.description() {
        header.push_str(&format!("Description: {}\n", description));
    }
    header
}

fn describe_field(field: &FieldSpec) -> String {
    let mut line = format!("{} ({}", field.name, field.field_type);
    if field.field_type == FieldType::Enum {
        let values = field
            .values
            .iter()
            .map(|v| format!("\"{}\"", v))
            .collect::<Vec<_>>()
            .join(", ");
        line.push_str(&format!("; one of: {}", values));
    }
    line.push(')');
    if let Some(description) = &field.description {
        line.push_str(&format!(": {}", description));
    }
    if let Some(example) = &field.example {
        line.push_str(&format!(" Example: {}", example));
    }
    line
}
