//! The translation engine: resolve, prompt, call, parse, validate, record.

use std::future::Future;

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use formtrans_history::{HistoryOutcome, HistoryRecord, HistoryStore};
use formtrans_schema::{FormRegistry, FormSchema};

use crate::config::EngineConfig;
use crate::error::TranslationError;
use crate::llm::{LlmClient, LlmError, ModelResponse};
use crate::prompt::PromptBuilder;
use crate::response::candidate_object;
use crate::validate::{validate, TranslationResult, ValidationStatus};

/// A request to translate content written for one form into another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub source_form_id: String,
    pub target_form_id: String,
    /// Passed to the model verbatim.
    pub source_text: String,
    /// Correlation id; generated when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl TranslationRequest {
    pub fn new(
        source_form_id: impl Into<String>,
        target_form_id: impl Into<String>,
        source_text: impl Into<String>,
    ) -> Self {
        Self {
            source_form_id: source_form_id.into(),
            target_form_id: target_form_id.into(),
            source_text: source_text.into(),
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }
}

/// Whether the attempt's history record was persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HistoryWrite {
    Recorded { record_id: String },
    Failed { reason: String },
}

impl HistoryWrite {
    pub fn record_id(&self) -> Option<&str> {
        match self {
            HistoryWrite::Recorded { record_id } => Some(record_id),
            HistoryWrite::Failed { .. } => None,
        }
    }
}

/// A successful translation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Translation {
    pub request_id: String,
    pub result: TranslationResult,
    pub history: HistoryWrite,
}

/// Orchestrates one translation per call. Holds only immutable state, so
/// one engine serves any number of concurrent calls.
pub struct TranslationEngine<R: FormRegistry, H: HistoryStore> {
    registry: R,
    history: H,
    client: Box<dyn LlmClient>,
    prompts: PromptBuilder,
    config: EngineConfig,
}

impl<R: FormRegistry, H: HistoryStore> TranslationEngine<R, H> {
    pub fn new(registry: R, history: H, client: Box<dyn LlmClient>, config: EngineConfig) -> Self {
        let prompts = PromptBuilder::with_preamble(config.preamble.clone());
        Self {
            registry,
            history,
            client,
            prompts,
            config,
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn history(&self) -> &H {
        &self.history
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Translate `request`. Exactly one model call on the success path and
    /// exactly one history record per call, whatever the outcome.
    pub async fn translate(
        &self,
        request: TranslationRequest,
    ) -> Result<Translation, TranslationError> {
        self.translate_until(request, std::future::pending::<()>())
            .await
    }

    /// Like [`translate`](Self::translate), but gives up when `cancel`
    /// resolves before the model answers.
    ///
    /// With an abort-safe client the call is dropped and a `cancelled`
    /// record is written. Otherwise the in-flight call is awaited and
    /// recorded as observed before `Cancelled` is returned.
    pub async fn translate_until<C>(
        &self,
        request: TranslationRequest,
        cancel: C,
    ) -> Result<Translation, TranslationError>
    where
        C: Future<Output = ()> + Send,
    {
        let request_id = request
            .request_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut attempt = Attempt::new(&request, request_id.clone());

        let (source, target) = match self.resolve(&request).await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(request_id = %request_id, error = %err, "schema resolution failed");
                self.record(attempt.failed(&err)).await;
                return Err(err);
            }
        };

        let prompt = self.prompts.build(&source, &target, &request.source_text);
        attempt.prompt_digest = Some(prompt.digest());
        tracing::debug!(
            request_id = %request_id,
            system_bytes = prompt.system.len(),
            user_bytes = prompt.user.len(),
            "prompt built"
        );

        let call = tokio::time::timeout(
            self.config.timeout,
            self.client.complete(prompt.messages(), &self.config.model),
        );
        tokio::pin!(call);
        tokio::pin!(cancel);

        let mut cancelled = false;
        let response = tokio::select! {
            biased;
            response = &mut call => response,
            _ = &mut cancel => {
                if self.client.abort_safe() {
                    tracing::info!(request_id = %request_id, "translation cancelled; model call dropped");
                    self.record(attempt.cancelled()).await;
                    return Err(TranslationError::Cancelled);
                }
                tracing::info!(
                    request_id = %request_id,
                    "translation cancelled; awaiting in-flight model call"
                );
                cancelled = true;
                call.await
            }
        };

        let outcome = match response {
            Err(_elapsed) => Err(TranslationError::ModelUnavailable {
                reason: format!("model call timed out after {:?}", self.config.timeout),
            }),
            Ok(Err(err)) => Err(model_error(err)),
            Ok(Ok(response)) => self.interpret(response, &target),
        };

        let translation = match outcome {
            Ok(result) => {
                let history = self.record(attempt.completed(&result)).await;
                match result.status {
                    ValidationStatus::Ok => tracing::info!(
                        request_id = %request_id,
                        source_form = source.id(),
                        target_form = target.id(),
                        status = "ok",
                        "translation complete"
                    ),
                    _ => tracing::warn!(
                        request_id = %request_id,
                        source_form = source.id(),
                        target_form = target.id(),
                        status = "partial",
                        warnings = result.warnings.len(),
                        "translation complete with unresolved fields"
                    ),
                }
                Translation {
                    request_id,
                    result,
                    history,
                }
            }
            Err(err) => {
                tracing::warn!(request_id = %request_id, error = %err, "translation failed");
                self.record(attempt.failed(&err)).await;
                if cancelled {
                    return Err(TranslationError::Cancelled);
                }
                return Err(err);
            }
        };

        if cancelled {
            return Err(TranslationError::Cancelled);
        }
        Ok(translation)
    }

    async fn resolve(
        &self,
        request: &TranslationRequest,
    ) -> Result<(FormSchema, FormSchema), TranslationError> {
        let source = self
            .registry
            .resolve(&request.source_form_id)
            .await
            .map_err(|e| TranslationError::from_registry(&request.source_form_id, e))?;
        let target = self
            .registry
            .resolve(&request.target_form_id)
            .await
            .map_err(|e| TranslationError::from_registry(&request.target_form_id, e))?;
        Ok((source, target))
    }

    fn interpret(
        &self,
        response: ModelResponse,
        target: &FormSchema,
    ) -> Result<TranslationResult, TranslationError> {
        let candidate = candidate_object(response, target).map_err(|reason| {
            tracing::debug!(%reason, "model response rejected");
            TranslationError::ResponseMalformed { reason }
        })?;
        Ok(validate(&candidate, target))
    }

    /// Append one record. Failures are logged and reported, never raised.
    async fn record(&self, record: HistoryRecord) -> HistoryWrite {
        let record_id = record.id.clone();
        match self.history.append(record).await {
            Ok(()) => HistoryWrite::Recorded { record_id },
            Err(err) => {
                tracing::error!(
                    target: "formtrans::history",
                    record_id = %record_id,
                    error = %err,
                    "failed to record translation history"
                );
                HistoryWrite::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}

fn model_error(err: LlmError) -> TranslationError {
    match err {
        // The call went through but the envelope was unreadable.
        LlmError::ParseError(reason) => TranslationError::ResponseMalformed { reason },
        other => TranslationError::ModelUnavailable {
            reason: other.to_string(),
        },
    }
}

/// The parts of a history record known before the attempt ends.
struct Attempt {
    request_id: String,
    source_form_id: String,
    target_form_id: String,
    source_text: String,
    prompt_digest: Option<String>,
}

impl Attempt {
    fn new(request: &TranslationRequest, request_id: String) -> Self {
        Self {
            request_id,
            source_form_id: request.source_form_id.clone(),
            target_form_id: request.target_form_id.clone(),
            source_text: request.source_text.clone(),
            prompt_digest: None,
        }
    }

    fn completed(&self, result: &TranslationResult) -> HistoryRecord {
        self.record(
            result.fields_json(),
            result.status.into(),
            None,
            result.warnings.len(),
        )
    }

    fn failed(&self, err: &TranslationError) -> HistoryRecord {
        self.record(
            serde_json::json!({}),
            HistoryOutcome::Failed,
            Some(err.to_string()),
            0,
        )
    }

    fn cancelled(&self) -> HistoryRecord {
        self.record(
            serde_json::json!({}),
            HistoryOutcome::Cancelled,
            Some(TranslationError::Cancelled.to_string()),
            0,
        )
    }

    fn record(
        &self,
        fields: serde_json::Value,
        outcome: HistoryOutcome,
        error: Option<String>,
        warning_count: usize,
    ) -> HistoryRecord {
        HistoryRecord {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: self.request_id.clone(),
            recorded_at: now_rfc3339(),
            source_form_id: self.source_form_id.clone(),
            target_form_id: self.target_form_id.clone(),
            source_text: self.source_text.clone(),
            fields,
            outcome,
            error,
            warning_count,
            prompt_digest: self.prompt_digest.clone(),
        }
    }
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}
