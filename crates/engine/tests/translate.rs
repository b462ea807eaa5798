//! End-to-end translation tests against an in-memory registry, in-memory
//! history, and a scripted model client.
//!
//! 1. Happy path: exact field set, one model call, one `ok` record
//! 2. Partial results: uncoercible and missing values become unknown
//! 3. Schema failures: zero model calls, one `failed` record
//! 4. Model failures: malformed output, transport errors, timeouts
//! 5. History failures never invalidate a result
//! 6. Concurrency: one record per translation, none lost
//! 7. Cancellation with abort-safe and non-abort-safe clients

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use formtrans_engine::{
    EngineConfig, HistoryWrite, LlmClient, LlmError, Message, ModelResponse, TranslationEngine,
    TranslationError, TranslationRequest, ValidationStatus, WarningKind,
};
use formtrans_history::{
    HistoryEntry, HistoryFilter, HistoryOutcome, HistoryRecord, HistoryStore,
    InMemoryHistoryStore, StarDelta, StorageError,
};
use formtrans_schema::{
    FieldSpec, FieldType, FieldValue, FormRegistry, FormSchema, FormSummary, InMemoryRegistry,
    RegistryError,
};

// ──────────────────────────────────────────────
// Test fixtures
// ──────────────────────────────────────────────

/// Scripted model client: pops canned responses, counts calls, and
/// captures the messages it was sent.
struct MockLlmClient {
    responses: Mutex<VecDeque<Result<ModelResponse, LlmError>>>,
    /// Fallback when the queue is empty.
    default: Option<ModelResponse>,
    delay: Duration,
    abort_safe: bool,
    calls: AtomicUsize,
    captured: Mutex<Vec<Vec<Message>>>,
}

impl MockLlmClient {
    fn new(responses: Vec<Result<ModelResponse, LlmError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            default: None,
            delay: Duration::ZERO,
            abort_safe: false,
            calls: AtomicUsize::new(0),
            captured: Mutex::new(Vec::new()),
        }
    }

    fn text(response: &str) -> Self {
        Self::new(vec![Ok(ModelResponse::Text(response.to_string()))])
    }

    fn always(response: serde_json::Value) -> Self {
        let mut client = Self::new(vec![]);
        client.default = Some(ModelResponse::Structured(response));
        client
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn abort_safe(mut self) -> Self {
        self.abort_safe = true;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(
        &self,
        messages: Vec<Message>,
        _model: &str,
    ) -> Result<ModelResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.captured.lock().unwrap().push(messages);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(response) => response,
            None => match &self.default {
                Some(response) => Ok(response.clone()),
                None => Err(LlmError::NetworkError("mock queue exhausted".to_string())),
            },
        }
    }

    fn abort_safe(&self) -> bool {
        self.abort_safe
    }
}

/// A history store whose writes always fail.
struct BrokenHistory;

#[async_trait]
impl HistoryStore for BrokenHistory {
    async fn append(&self, _record: HistoryRecord) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("disk full".to_string()))
    }

    async fn get(&self, record_id: &str) -> Result<HistoryEntry, StorageError> {
        Err(StorageError::RecordNotFound {
            record_id: record_id.to_string(),
        })
    }

    async fn list(&self, _filter: &HistoryFilter) -> Result<Vec<HistoryEntry>, StorageError> {
        Err(StorageError::Unavailable("disk full".to_string()))
    }

    async fn star(&self, record_id: &str, _delta: StarDelta) -> Result<u32, StorageError> {
        Err(StorageError::RecordNotFound {
            record_id: record_id.to_string(),
        })
    }
}

/// A registry whose backing source cannot be read.
struct UnreachableRegistry;

#[async_trait]
impl FormRegistry for UnreachableRegistry {
    async fn resolve(&self, _form_id: &str) -> Result<FormSchema, RegistryError> {
        Err(RegistryError::Unavailable {
            reason: "forms.json: permission denied".to_string(),
        })
    }

    async fn list(&self) -> Result<Vec<FormSummary>, RegistryError> {
        Err(RegistryError::Unavailable {
            reason: "forms.json: permission denied".to_string(),
        })
    }
}

fn intake() -> FormSchema {
    FormSchema::new(
        "intake",
        vec![
            FieldSpec::new("full_name", FieldType::Text),
            FieldSpec::new("years", FieldType::Number),
            FieldSpec::new("contact", FieldType::Text),
        ],
    )
    .unwrap()
    .with_name("Patient Intake")
}

fn person() -> FormSchema {
    FormSchema::new(
        "person",
        vec![
            FieldSpec::new("name", FieldType::Text),
            FieldSpec::new("age", FieldType::Number),
            FieldSpec::new("email", FieldType::Text),
        ],
    )
    .unwrap()
}

fn registry() -> InMemoryRegistry {
    InMemoryRegistry::new(vec![intake(), person()]).unwrap()
}

type Engine = TranslationEngine<InMemoryRegistry, Arc<InMemoryHistoryStore>>;

fn engine_with(client: Arc<MockLlmClient>, config: EngineConfig) -> (Engine, Arc<InMemoryHistoryStore>) {
    let history = Arc::new(InMemoryHistoryStore::new());
    let engine = TranslationEngine::new(registry(), history.clone(), Box::new(client), config);
    (engine, history)
}

fn engine(client: Arc<MockLlmClient>) -> (Engine, Arc<InMemoryHistoryStore>) {
    engine_with(client, EngineConfig::default())
}

fn request(text: &str) -> TranslationRequest {
    TranslationRequest::new("intake", "person", text)
}

// ──────────────────────────────────────────────
// 1. Happy path
// ──────────────────────────────────────────────

#[tokio::test]
async fn translation_carries_exact_target_field_set() {
    let client = Arc::new(MockLlmClient::text(
        r#"{"name": "Jo Park", "age": 30, "email": "jo@x.com"}"#,
    ));
    let (engine, history) = engine(client.clone());

    let translation = engine
        .translate(request("Jo Park, thirty years old, jo@x.com"))
        .await
        .unwrap();

    let keys: Vec<&str> = translation.result.fields.keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["name", "age", "email"]);
    assert_eq!(
        translation.result.fields["email"],
        FieldValue::Text("jo@x.com".to_string())
    );
    assert_eq!(translation.result.status, ValidationStatus::Ok);
    assert_eq!(translation.result.target_form_id, "person");
    assert_eq!(client.calls(), 1);

    let records = history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, HistoryOutcome::Ok);
    assert_eq!(records[0].request_id, translation.request_id);
    assert_eq!(records[0].fields, json!({"name": "Jo Park", "age": 30, "email": "jo@x.com"}));
    assert_eq!(
        translation.history,
        HistoryWrite::Recorded {
            record_id: records[0].id.clone()
        }
    );
    assert_eq!(records[0].prompt_digest.as_ref().map(|d| d.len()), Some(64));
}

#[tokio::test]
async fn source_text_reaches_the_model_verbatim() {
    let client = Arc::new(MockLlmClient::always(json!({"name": "A"})));
    let (engine, _history) = engine(client.clone());
    let text = "Name: A\n  Age: unknown {really}";

    engine.translate(request(text)).await.unwrap();

    let captured = client.captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0][0].role, "system");
    assert!(captured[0][1].content.contains(text));
}

#[tokio::test]
async fn caller_request_id_used_verbatim() {
    let client = Arc::new(MockLlmClient::always(json!({"name": "A"})));
    let (engine, history) = engine(client);

    let translation = engine
        .translate(request("A").with_request_id("req-42"))
        .await
        .unwrap();

    assert_eq!(translation.request_id, "req-42");
    let records = history.records();
    assert_eq!(records[0].request_id, "req-42");
    assert_ne!(records[0].id, "req-42");
}

#[tokio::test]
async fn same_source_and_target_still_calls_model() {
    let client = Arc::new(MockLlmClient::always(json!({"name": "A", "age": 1, "email": "a@b.c"})));
    let (engine, _history) = engine(client.clone());

    let translation = engine
        .translate(TranslationRequest::new("person", "person", "A, 1, a@b.c"))
        .await
        .unwrap();

    assert_eq!(client.calls(), 1);
    assert_eq!(translation.result.status, ValidationStatus::Ok);
}

// ──────────────────────────────────────────────
// 2. Partial results
// ──────────────────────────────────────────────

#[tokio::test]
async fn uncoercible_value_yields_partial_record() {
    let client = Arc::new(MockLlmClient::text(
        "```json\n{\"name\": \"Jo\", \"age\": \"thirty\", \"email\": \"jo@x.com\"}\n```",
    ));
    let (engine, history) = engine(client);

    let translation = engine.translate(request("Jo, thirty")).await.unwrap();

    assert_eq!(translation.result.status, ValidationStatus::Partial);
    assert_eq!(translation.result.fields["age"], FieldValue::Unknown);
    assert_eq!(translation.result.warnings[0].kind, WarningKind::Uncoercible);

    let records = history.records();
    assert_eq!(records[0].outcome, HistoryOutcome::Partial);
    assert_eq!(records[0].warning_count, 1);
    assert_eq!(records[0].fields["age"], serde_json::Value::Null);
}

#[tokio::test]
async fn extra_keys_are_dropped_and_missing_keys_unknown() {
    let client = Arc::new(MockLlmClient::text(r#"{"name": "Jo", "ssn": "000-00-0000"}"#));
    let (engine, _history) = engine(client);

    let translation = engine.translate(request("Jo")).await.unwrap();

    assert_eq!(translation.result.fields.len(), 3);
    assert!(!translation.result.fields.contains_key("ssn"));
    assert!(translation.result.fields["age"].is_unknown());
    assert!(translation.result.fields["email"].is_unknown());
}

// ──────────────────────────────────────────────
// 3. Schema failures
// ──────────────────────────────────────────────

#[tokio::test]
async fn unknown_target_fails_without_model_call() {
    let client = Arc::new(MockLlmClient::always(json!({})));
    let (engine, history) = engine(client.clone());

    let err = engine
        .translate(TranslationRequest::new("intake", "nope", "text"))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        TranslationError::SchemaNotFound {
            form_id: "nope".to_string()
        }
    );
    assert_eq!(client.calls(), 0);
    let records = history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, HistoryOutcome::Failed);
    assert!(records[0].prompt_digest.is_none());
    assert!(records[0].error.as_deref().unwrap().contains("nope"));
}

#[tokio::test]
async fn unknown_source_fails_without_model_call() {
    let client = Arc::new(MockLlmClient::always(json!({})));
    let (engine, _history) = engine(client.clone());

    let err = engine
        .translate(TranslationRequest::new("ghost", "person", "text"))
        .await
        .unwrap_err();

    assert!(matches!(err, TranslationError::SchemaNotFound { ref form_id } if form_id == "ghost"));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn unreadable_registry_is_schema_unavailable() {
    let client = Arc::new(MockLlmClient::always(json!({})));
    let history = Arc::new(InMemoryHistoryStore::new());
    let engine = TranslationEngine::new(
        UnreachableRegistry,
        history.clone(),
        Box::new(client.clone()),
        EngineConfig::default(),
    );

    let err = engine.translate(request("text")).await.unwrap_err();

    assert!(matches!(
        err,
        TranslationError::SchemaUnavailable { ref reason, .. } if reason.contains("permission denied")
    ));
    assert!(err.is_retryable());
    assert_eq!(client.calls(), 0);
    let records = history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, HistoryOutcome::Failed);
    assert!(records[0].prompt_digest.is_none());
}

// ──────────────────────────────────────────────
// 4. Model failures
// ──────────────────────────────────────────────

#[tokio::test]
async fn malformed_output_records_failure() {
    let client = Arc::new(MockLlmClient::text("Sorry, I can't do that."));
    let (engine, history) = engine(client.clone());

    let err = engine.translate(request("text")).await.unwrap_err();

    assert!(matches!(err, TranslationError::ResponseMalformed { .. }));
    assert_eq!(client.calls(), 1);
    let records = history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, HistoryOutcome::Failed);
    assert_eq!(records[0].fields, json!({}));
    assert!(records[0].prompt_digest.is_some());
}

#[tokio::test]
async fn unreadable_provider_reply_is_malformed() {
    let client = Arc::new(MockLlmClient::new(vec![Err(LlmError::ParseError(
        "no message content in chat completion".to_string(),
    ))]));
    let (engine, history) = engine(client.clone());

    let err = engine.translate(request("text")).await.unwrap_err();

    assert!(matches!(
        err,
        TranslationError::ResponseMalformed { ref reason } if reason.contains("no message content")
    ));
    assert!(!err.is_retryable());
    assert_eq!(client.calls(), 1);
    let records = history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, HistoryOutcome::Failed);
    assert_eq!(records[0].fields, json!({}));
}

#[tokio::test]
async fn transport_error_is_model_unavailable_and_not_retried() {
    let client = Arc::new(MockLlmClient::new(vec![
        Err(LlmError::ApiError {
            status: 503,
            message: "overloaded".to_string(),
        }),
        Ok(ModelResponse::Structured(json!({"name": "never used"}))),
    ]));
    let (engine, history) = engine(client.clone());

    let err = engine.translate(request("text")).await.unwrap_err();

    assert!(matches!(err, TranslationError::ModelUnavailable { ref reason } if reason.contains("overloaded")));
    assert!(err.is_retryable());
    assert_eq!(client.calls(), 1);
    assert_eq!(history.records()[0].outcome, HistoryOutcome::Failed);
}

#[tokio::test]
async fn slow_model_times_out() {
    let client = Arc::new(
        MockLlmClient::always(json!({"name": "late"})).with_delay(Duration::from_secs(5)),
    );
    let config = EngineConfig {
        timeout: Duration::from_millis(20),
        ..EngineConfig::default()
    };
    let (engine, history) = engine_with(client, config);

    let err = engine.translate(request("text")).await.unwrap_err();

    assert!(matches!(err, TranslationError::ModelUnavailable { ref reason } if reason.contains("timed out")));
    assert_eq!(history.records().len(), 1);
}

// ──────────────────────────────────────────────
// 5. History failures
// ──────────────────────────────────────────────

#[tokio::test]
async fn history_failure_does_not_invalidate_result() {
    let client = Arc::new(MockLlmClient::always(json!({"name": "Jo", "age": 3, "email": "j@x"})));
    let engine = TranslationEngine::new(
        registry(),
        BrokenHistory,
        Box::new(client),
        EngineConfig::default(),
    );

    let translation = engine.translate(request("Jo")).await.unwrap();

    assert_eq!(translation.result.status, ValidationStatus::Ok);
    assert!(matches!(translation.history, HistoryWrite::Failed { ref reason } if reason.contains("disk full")));
    assert_eq!(translation.history.record_id(), None);
}

// ──────────────────────────────────────────────
// 6. Concurrency
// ──────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_translations_record_once_each() {
    const N: usize = 16;
    let client = Arc::new(
        MockLlmClient::always(json!({"name": "Jo", "age": 30, "email": "jo@x.com"}))
            .with_delay(Duration::from_millis(5)),
    );
    let (engine, history) = engine(client.clone());
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for i in 0..N {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .translate(request("Jo").with_request_id(format!("req-{i}")))
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(client.calls(), N);
    let records = history.records();
    assert_eq!(records.len(), N);
    let mut request_ids: Vec<String> = records.iter().map(|r| r.request_id.clone()).collect();
    request_ids.sort();
    request_ids.dedup();
    assert_eq!(request_ids.len(), N);
    let mut ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), N);
}

// ──────────────────────────────────────────────
// 7. Cancellation
// ──────────────────────────────────────────────

#[tokio::test]
async fn cancel_with_abort_safe_client_records_cancelled() {
    let client = Arc::new(
        MockLlmClient::always(json!({"name": "late"}))
            .with_delay(Duration::from_secs(5))
            .abort_safe(),
    );
    let (engine, history) = engine(client.clone());

    let err = engine
        .translate_until(request("text"), tokio::time::sleep(Duration::from_millis(10)))
        .await
        .unwrap_err();

    assert_eq!(err, TranslationError::Cancelled);
    let records = history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, HistoryOutcome::Cancelled);
}

#[tokio::test]
async fn cancel_with_unsafe_client_records_observed_outcome() {
    let client = Arc::new(
        MockLlmClient::always(json!({"name": "Jo", "age": 30, "email": "jo@x.com"}))
            .with_delay(Duration::from_millis(50)),
    );
    let (engine, history) = engine(client.clone());

    let err = engine
        .translate_until(request("text"), std::future::ready(()))
        .await
        .unwrap_err();

    assert_eq!(err, TranslationError::Cancelled);
    assert_eq!(client.calls(), 1);
    let records = history.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, HistoryOutcome::Ok);
}

#[tokio::test]
async fn cancel_after_answer_has_no_effect() {
    let client = Arc::new(MockLlmClient::always(json!({"name": "Jo", "age": 30, "email": "jo@x.com"})).abort_safe());
    let (engine, history) = engine(client);

    let translation = engine
        .translate_until(request("text"), tokio::time::sleep(Duration::from_secs(5)))
        .await
        .unwrap();

    assert_eq!(translation.result.status, ValidationStatus::Ok);
    assert_eq!(history.records()[0].outcome, HistoryOutcome::Ok);
}
