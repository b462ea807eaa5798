//! The form registry contract and two local implementations.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::deserialize::forms_from_json;
use crate::types::{FormSchema, FormSummary};

/// Errors returned by a [`FormRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The identifier is not known to the registry. Retrying will not help.
    #[error("form not found: {form_id}")]
    NotFound { form_id: String },

    /// The registry could not be consulted right now (I/O, bad backing
    /// document, upstream outage). The caller may retry.
    #[error("form registry unavailable: {reason}")]
    Unavailable { reason: String },

    /// Two forms share an identifier.
    #[error("duplicate form id: {form_id}")]
    DuplicateForm { form_id: String },
}

/// Resolves form identifiers to their schemas.
///
/// Implementations are read-mostly and must be `Send + Sync` so one registry
/// can serve many concurrent translations. Callers never mutate a returned
/// schema.
#[async_trait]
pub trait FormRegistry: Send + Sync {
    /// Resolve a form identifier to its schema.
    async fn resolve(&self, form_id: &str) -> Result<FormSchema, RegistryError>;

    /// Summaries of every known form, in registry order.
    async fn list(&self) -> Result<Vec<FormSummary>, RegistryError>;
}

// ── In-memory ───────────────────────────────────────────────────────

/// A registry over a fixed set of schemas.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    forms: Vec<FormSchema>,
}

impl InMemoryRegistry {
    pub fn new(forms: Vec<FormSchema>) -> Result<Self, RegistryError> {
        check_unique_ids(&forms)?;
        Ok(Self { forms })
    }

    pub fn len(&self) -> usize {
        self.forms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forms.is_empty()
    }
}

#[async_trait]
impl FormRegistry for InMemoryRegistry {
    async fn resolve(&self, form_id: &str) -> Result<FormSchema, RegistryError> {
        find(&self.forms, form_id)
    }

    async fn list(&self) -> Result<Vec<FormSummary>, RegistryError> {
        Ok(self.forms.iter().map(FormSummary::from).collect())
    }
}

// ── File-backed ─────────────────────────────────────────────────────

/// A registry backed by a JSON document on disk.
///
/// The document is re-read on every call, so edits to the file take effect
/// without a restart. A missing or unparseable file is reported as
/// [`RegistryError::Unavailable`].
#[derive(Debug, Clone)]
pub struct FileRegistry {
    path: PathBuf,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<FormSchema>, RegistryError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to read form registry");
            RegistryError::Unavailable {
                reason: format!("reading '{}': {}", self.path.display(), e),
            }
        })?;
        let doc: serde_json::Value =
            serde_json::from_str(&raw).map_err(|e| RegistryError::Unavailable {
                reason: format!("parsing '{}': {}", self.path.display(), e),
            })?;
        let forms = forms_from_json(&doc).map_err(|e| RegistryError::Unavailable {
            reason: format!("'{}': {}", self.path.display(), e),
        })?;
        check_unique_ids(&forms)?;
        tracing::debug!(path = %self.path.display(), forms = forms.len(), "loaded form registry");
        Ok(forms)
    }
}

#[async_trait]
impl FormRegistry for FileRegistry {
    async fn resolve(&self, form_id: &str) -> Result<FormSchema, RegistryError> {
        let forms = self.load().await?;
        find(&forms, form_id)
    }

    async fn list(&self) -> Result<Vec<FormSummary>, RegistryError> {
        Ok(self.load().await?.iter().map(FormSummary::from).collect())
    }
}

fn find(forms: &[FormSchema], form_id: &str) -> Result<FormSchema, RegistryError> {
    forms
        .iter()
        .find(|f| f.id() == form_id)
        .cloned()
        .ok_or_else(|| RegistryError::NotFound {
            form_id: form_id.to_string(),
        })
}

fn check_unique_ids(forms: &[FormSchema]) -> Result<(), RegistryError> {
    let mut seen = std::collections::HashSet::new();
    for form in forms {
        if !seen.insert(form.id()) {
            return Err(RegistryError::DuplicateForm {
                form_id: form.id().to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FieldSpec, FieldType};
    use std::io::Write;

    fn schema(id: &str) -> FormSchema {
        FormSchema::new(id, vec![FieldSpec::new("name", FieldType::Text)]).unwrap()
    }

    #[tokio::test]
    async fn in_memory_resolves_known_form() {
        let registry = InMemoryRegistry::new(vec![schema("a"), schema("b")]).unwrap();
        let b = registry.resolve("b").await.unwrap();
        assert_eq!(b.id(), "b");
        assert_eq!(registry.len(), 2);
    }

    #[tokio::test]
    async fn in_memory_unknown_form_is_not_found() {
        let registry = InMemoryRegistry::new(vec![schema("a")]).unwrap();
        assert_eq!(
            registry.resolve("zzz").await.unwrap_err(),
            RegistryError::NotFound {
                form_id: "zzz".to_string()
            }
        );
    }

    #[test]
    fn duplicate_ids_rejected() {
        assert!(matches!(
            InMemoryRegistry::new(vec![schema("a"), schema("a")]),
            Err(RegistryError::DuplicateForm { .. })
        ));
    }

    #[tokio::test]
    async fn file_registry_reads_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"forms": [{{"id": "contact", "name": "Contact", "fields": [
                {{"name": "email", "type": "text"}},
                {{"name": "subscribed", "type": "boolean"}}
            ]}}]}}"#
        )
        .unwrap();

        let registry = FileRegistry::new(file.path());
        let contact = registry.resolve("contact").await.unwrap();
        assert_eq!(contact.fields().len(), 2);

        let listed = registry.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "Contact");

        assert!(matches!(
            registry.resolve("missing").await,
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn file_registry_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::new(dir.path().join("nope.json"));
        assert!(matches!(
            registry.resolve("a").await,
            Err(RegistryError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn file_registry_bad_json_is_unavailable() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let registry = FileRegistry::new(file.path());
        assert!(matches!(
            registry.list().await,
            Err(RegistryError::Unavailable { .. })
        ));
    }
}
