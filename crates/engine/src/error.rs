use formtrans_schema::RegistryError;

/// Terminal failures of a single translation call. None are retried
/// internally; every one is still written to history.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslationError {
    /// The source or target form id is unknown to the registry.
    #[error("form not found: {form_id}")]
    SchemaNotFound { form_id: String },

    /// The registry could not be consulted. The caller may retry.
    #[error("form registry unavailable while resolving '{form_id}': {reason}")]
    SchemaUnavailable { form_id: String, reason: String },

    /// The model call failed at the transport level or timed out.
    #[error("language model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    /// The model answered, but not with a JSON object we can read.
    #[error("model response malformed: {reason}")]
    ResponseMalformed { reason: String },

    /// The caller cancelled before a result was returned.
    #[error("translation cancelled")]
    Cancelled,
}

impl TranslationError {
    pub(crate) fn from_registry(form_id: &str, err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound { form_id } => TranslationError::SchemaNotFound { form_id },
            RegistryError::Unavailable { reason } => TranslationError::SchemaUnavailable {
                form_id: form_id.to_string(),
                reason,
            },
            other @ RegistryError::DuplicateForm { .. } => TranslationError::SchemaUnavailable {
                form_id: form_id.to_string(),
                reason: other.to_string(),
            },
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TranslationError::SchemaUnavailable { .. } | TranslationError::ModelUnavailable { .. }
        )
    }
}
