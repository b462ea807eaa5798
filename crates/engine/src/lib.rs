//! formtrans-engine: translate content written for one form into another.
//!
//! The [`TranslationEngine`] resolves both schemas through a
//! [`formtrans_schema::FormRegistry`], builds a deterministic [`Prompt`],
//! calls the model once through an [`LlmClient`], fits the answer to the
//! target schema with [`validate`], and appends one
//! [`formtrans_history::HistoryRecord`] per attempt.

pub mod config;
pub mod engine;
pub mod error;
pub mod llm;
pub mod prompt;
mod response;
pub mod validate;

pub use config::{EngineConfig, ModelConfig, Provider, DEFAULT_MODEL, DEFAULT_TIMEOUT};
pub use engine::{HistoryWrite, Translation, TranslationEngine, TranslationRequest};
pub use error::TranslationError;
pub use llm::{LlmClient, LlmError, Message, ModelResponse, OfflineClient};
pub use prompt::{Prompt, PromptBuilder};
pub use validate::{validate, FieldWarning, TranslationResult, ValidationStatus, WarningKind};

#[cfg(feature = "anthropic")]
pub use llm::AnthropicClient;
#[cfg(feature = "openai")]
pub use llm::OpenAiClient;
