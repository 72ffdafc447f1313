//! Job dispatcher — the serverless entry point.
//!
//! A job is a JSON envelope `{"input": {"action": ..., ...}}`. The dispatcher
//! always answers with a JSON object: either the action's output or
//! `{"error": "..."}`. Each job runs in its own task, so a panicking handler
//! turns into an error reply and the dispatcher keeps serving.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

use pleasance_core::types::{
    GenerationItem, ReviewItem, ReviewVerdict, SectionResult, Subject, UNKNOWN_NAME,
};

use crate::batch::BatchOrchestrator;

/// Section written by `generate` when the job names none.
pub const DEFAULT_SECTION: &str = "appeal";

/// Action run when the job names none.
pub const DEFAULT_ACTION: &str = "generate";

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job has no 'input' object")]
    MissingInput,
    #[error("job 'action' must be a string")]
    InvalidAction,
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("job input has no '{0}'")]
    MissingField(&'static str),
    #[error("'{0}' must be a list")]
    NotAList(&'static str),
    #[error("invalid '{field}': {source}")]
    InvalidField {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("job handler crashed: {0}")]
    Crashed(String),
}

impl JobError {
    fn into_output(self) -> Value {
        json!({ "error": self.to_string() })
    }
}

/// A list entry that could not be decoded. It still yields a result of its
/// own, attributed to whatever identity could be read from it.
#[derive(Clone, Debug, PartialEq)]
struct Rejected {
    subject_id: String,
    section_key: String,
    reason: String,
}

impl Rejected {
    fn new(entry: &Value, reason: String) -> Self {
        let text = |key: &str| entry.get(key).and_then(Value::as_str).unwrap_or_default();
        let subject_id = match text("kinkId") {
            "" => text("id"),
            id => id,
        };
        Self {
            subject_id: subject_id.to_string(),
            section_key: text("sectionKey").to_string(),
            reason,
        }
    }

    fn generation_item(&self, section_key: &str) -> GenerationItem {
        GenerationItem {
            subject_id: self.subject_id.clone(),
            subject_name: UNKNOWN_NAME.to_string(),
            category: None,
            section_key: section_key.to_string(),
        }
    }

    fn review_item(&self) -> ReviewItem {
        ReviewItem {
            subject_id: self.subject_id.clone(),
            subject_name: UNKNOWN_NAME.to_string(),
            section_key: self.section_key.clone(),
            content: String::new(),
        }
    }
}

/// A parsed job.
#[derive(Clone, Debug, PartialEq)]
enum Action {
    Health,
    Generate(GenerationItem),
    BatchGenerate(Vec<Result<Subject, Rejected>>),
    Review(ReviewItem),
    BatchReview(Vec<Result<ReviewItem, Rejected>>),
}

impl Action {
    fn parse(job: Value) -> Result<Self, JobError> {
        let Value::Object(mut envelope) = job else {
            return Err(JobError::MissingInput);
        };
        let Some(Value::Object(input)) = envelope.remove("input") else {
            return Err(JobError::MissingInput);
        };
        let action = match input.get("action") {
            None | Some(Value::Null) => DEFAULT_ACTION,
            Some(Value::String(action)) => action.as_str(),
            Some(_) => return Err(JobError::InvalidAction),
        };

        match action {
            "health" => Ok(Self::Health),
            "generate" => {
                let kink: Subject = field(&input, "kink")?;
                let section_key = optional_field::<String>(&input, "sectionKey")?
                    .unwrap_or_else(|| DEFAULT_SECTION.to_string());
                Ok(Self::Generate(kink.generation_item(section_key)))
            }
            "batch_generate" => Ok(Self::BatchGenerate(each_entry(&input, "kinks")?)),
            "review" => {
                let kink: Subject = field(&input, "kink")?;
                Ok(Self::Review(ReviewItem {
                    subject_id: kink.id,
                    subject_name: kink.name,
                    section_key: field(&input, "sectionKey")?,
                    content: field(&input, "content")?,
                }))
            }
            "batch_review" => Ok(Self::BatchReview(each_entry(&input, "items")?)),
            other => Err(JobError::UnknownAction(other.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Generate(_) => "generate",
            Self::BatchGenerate(_) => "batch_generate",
            Self::Review(_) => "review",
            Self::BatchReview(_) => "batch_review",
        }
    }
}

fn optional_field<T: DeserializeOwned>(
    input: &Map<String, Value>,
    name: &'static str,
) -> Result<Option<T>, JobError> {
    match input.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => T::deserialize(value)
            .map(Some)
            .map_err(|source| JobError::InvalidField { field: name, source }),
    }
}

/// Decode a list field entry by entry, so one bad entry doesn't sink the rest.
fn each_entry<T: DeserializeOwned>(
    input: &Map<String, Value>,
    name: &'static str,
) -> Result<Vec<Result<T, Rejected>>, JobError> {
    let entries = match input.get(name) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(JobError::NotAList(name)),
    };
    Ok(entries
        .iter()
        .map(|entry| {
            T::deserialize(entry).map_err(|e| {
                warn!(field = name, "Skipping invalid entry: {}", e);
                Rejected::new(entry, format!("Invalid entry in '{name}': {e}"))
            })
        })
        .collect())
}

fn field<T: DeserializeOwned>(input: &Map<String, Value>, name: &'static str) -> Result<T, JobError> {
    optional_field(input, name)?.ok_or(JobError::MissingField(name))
}

// ─────────────────────────────────────────────
// JobDispatcher
// ─────────────────────────────────────────────

pub struct JobDispatcher {
    orchestrator: Arc<BatchOrchestrator>,
}

impl JobDispatcher {
    pub fn new(orchestrator: Arc<BatchOrchestrator>) -> Self {
        Self { orchestrator }
    }

    /// Handle one job. Never fails: errors come back as `{"error": ...}`.
    pub async fn handle(self: &Arc<Self>, job: Value) -> Value {
        let action = match Action::parse(job) {
            Ok(action) => action,
            Err(e) => {
                warn!("Rejected job: {}", e);
                return e.into_output();
            }
        };

        let name = action.name();
        debug!(action = name, "Dispatching job");

        let dispatcher = Arc::clone(self);
        match tokio::spawn(async move { dispatcher.run(action).await }).await {
            Ok(output) => output,
            Err(e) => {
                error!(action = name, "Job handler crashed: {}", e);
                JobError::Crashed(e.to_string()).into_output()
            }
        }
    }

    async fn run(&self, action: Action) -> Value {
        let generator = self.orchestrator.generator();
        match action {
            Action::Health => {
                let proxy = generator.health_check().await;
                json!({ "status": "ok", "proxy": proxy })
            }
            Action::Generate(item) => {
                json!({ "section": generator.generate_section(&item).await })
            }
            Action::BatchGenerate(kinks) => {
                let keys: Vec<&str> = generator.prompts().section_keys().collect();
                let subjects: Vec<Subject> =
                    kinks.iter().filter_map(|kink| kink.as_ref().ok()).cloned().collect();
                let mut generated = self.orchestrator.generate_all(&subjects).await.into_iter();

                let mut sections = Vec::with_capacity(kinks.len() * keys.len());
                for kink in &kinks {
                    match kink {
                        Ok(_) => sections.extend(generated.by_ref().take(keys.len())),
                        Err(rejected) => sections.extend(keys.iter().map(|key| {
                            SectionResult::failed(&rejected.generation_item(key), &rejected.reason)
                        })),
                    }
                }
                json!({ "count": sections.len(), "sections": sections })
            }
            Action::Review(item) => {
                json!({ "review": generator.review_section(&item).await })
            }
            Action::BatchReview(entries) => {
                let items = entries.iter().filter_map(|e| e.as_ref().ok()).cloned().collect();
                let mut reviewed = self.orchestrator.review_batch(items).await.into_iter();

                let mut reviews: Vec<ReviewVerdict> = Vec::with_capacity(entries.len());
                for entry in &entries {
                    match entry {
                        Ok(_) => reviews.extend(reviewed.next()),
                        Err(rejected) => reviews.push(ReviewVerdict::fail_open(
                            &rejected.review_item(),
                            &rejected.reason,
                        )),
                    }
                }
                json!({ "count": reviews.len(), "reviews": reviews })
            }
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::tests::{generator, ScriptedBackend};
    use crate::generator::ALL_MODELS_FAILED;
    use async_trait::async_trait;
    use pleasance_providers::{CompletionBackend, CompletionParams};

    fn dispatcher(backend: Arc<dyn CompletionBackend>) -> Arc<JobDispatcher> {
        let orchestrator = BatchOrchestrator::new(Arc::new(generator(backend)));
        Arc::new(JobDispatcher::new(Arc::new(orchestrator)))
    }

    fn scripted() -> Arc<JobDispatcher> {
        dispatcher(Arc::new(ScriptedBackend {
            rules: vec![
                ("KINK:", r#"{"approved": false, "issues": ["too short"], "severity": "low"}"#),
                ("'Rope'", "Generated text"),
            ],
        }))
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let out = scripted()
            .handle(json!({"input": {"action": "dance"}}))
            .await;
        assert_eq!(out, json!({"error": "Unknown action: dance"}));
    }

    #[tokio::test]
    async fn test_malformed_envelopes() {
        let d = scripted();
        for job in [
            json!("generate"),
            json!({}),
            json!({"input": "generate"}),
            json!({"input": {}}),
            json!({"input": {"action": 7}}),
            json!({"input": {"action": "batch_generate", "kinks": {"id": "k"}}}),
            json!({"input": {"action": "generate"}}),
            json!({"input": {"action": "generate", "kink": {"name": "no id"}}}),
            json!({"input": {"action": "review", "kink": {"id": "k", "name": "n"}}}),
        ] {
            let out = d.handle(job.clone()).await;
            assert!(out["error"].is_string(), "no error for {job}: {out}");
        }
    }

    #[tokio::test]
    async fn test_generate_defaults_to_appeal() {
        let out = scripted()
            .handle(json!({"input": {"action": "generate", "kink": {"id": "k-1", "name": "Rope"}}}))
            .await;
        assert_eq!(out["section"]["kinkId"], "k-1");
        assert_eq!(out["section"]["sectionKey"], "appeal");
        assert_eq!(out["section"]["content"], "Generated text");
        assert_eq!(out["section"]["model"], "gen-model");
    }

    #[tokio::test]
    async fn test_missing_action_runs_generate() {
        let out = scripted()
            .handle(json!({"input": {"kink": {"id": "k-1", "name": "Rope"}}}))
            .await;
        assert_eq!(out["section"]["kinkId"], "k-1");
        assert_eq!(out["section"]["sectionKey"], "appeal");
        assert_eq!(out["section"]["content"], "Generated text");
    }

    #[tokio::test]
    async fn test_generate_failure_is_in_section() {
        let out = scripted()
            .handle(json!({"input": {
                "action": "generate",
                "kink": {"id": "k-2", "name": "Wax"},
                "sectionKey": "howTo"
            }}))
            .await;
        assert_eq!(out["section"]["sectionKey"], "howTo");
        assert_eq!(out["section"]["content"], Value::Null);
        assert_eq!(out["section"]["error"], ALL_MODELS_FAILED);
    }

    #[tokio::test]
    async fn test_batch_generate() {
        let out = scripted()
            .handle(json!({"input": {
                "action": "batch_generate",
                "kinks": [{"id": "k-1", "name": "Rope"}, {"id": "k-2", "name": "Wax"}]
            }}))
            .await;
        assert_eq!(out["count"], 6);
        let sections = out["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 6);
        assert_eq!(sections[3]["kinkId"], "k-2");
        assert_eq!(sections[3]["sectionKey"], "appeal");
    }

    #[tokio::test]
    async fn test_batch_generate_keeps_good_kinks() {
        let out = scripted()
            .handle(json!({"input": {
                "action": "batch_generate",
                "kinks": [
                    {"id": "k-1", "name": "Rope"},
                    {"id": "k-2"},
                    {"name": "no id"},
                    {"id": "k-4", "name": "Rope"}
                ]
            }}))
            .await;
        assert_eq!(out["count"], 12);
        let sections = out["sections"].as_array().unwrap();

        // Well-formed kinks keep their sections, in order.
        assert_eq!(sections[0]["kinkId"], "k-1");
        assert_eq!(sections[0]["content"], "Generated text");
        assert_eq!(sections[9]["kinkId"], "k-4");
        assert_eq!(sections[11]["sectionKey"], "variations");
        assert_eq!(sections[11]["content"], "Generated text");

        // A nameless kink is written as "Unknown"; the scripted backend only knows Rope.
        assert_eq!(sections[3]["kinkId"], "k-2");
        assert_eq!(sections[3]["error"], ALL_MODELS_FAILED);

        // An undecodable kink still gets one failed result per section.
        for section in &sections[6..9] {
            assert_eq!(section["content"], Value::Null);
            assert!(section["error"].as_str().unwrap().contains("Invalid entry in 'kinks'"));
        }
        assert_eq!(sections[7]["sectionKey"], "howTo");
    }

    #[tokio::test]
    async fn test_batch_review_keeps_good_items() {
        let out = scripted()
            .handle(json!({"input": {
                "action": "batch_review",
                "items": [
                    {"kinkId": "k-1", "name": "Rope", "sectionKey": "appeal", "content": "a"},
                    {"kinkId": "k-2", "sectionKey": "howTo"}
                ]
            }}))
            .await;
        assert_eq!(out["count"], 2);
        assert_eq!(out["reviews"][0]["approved"], false);
        assert_eq!(out["reviews"][1]["kinkId"], "k-2");
        assert_eq!(out["reviews"][1]["sectionKey"], "howTo");
        assert_eq!(out["reviews"][1]["approved"], true);
        assert!(out["reviews"][1]["error"].as_str().unwrap().contains("content"));
    }

    #[tokio::test]
    async fn test_batch_generate_without_kinks() {
        let out = scripted()
            .handle(json!({"input": {"action": "batch_generate"}}))
            .await;
        assert_eq!(out, json!({"count": 0, "sections": []}));
    }

    #[tokio::test]
    async fn test_review_and_batch_review() {
        let d = scripted();
        let out = d
            .handle(json!({"input": {
                "action": "review",
                "kink": {"id": "k-1", "name": "Rope"},
                "sectionKey": "howTo",
                "content": "Start slow."
            }}))
            .await;
        assert_eq!(out["review"]["approved"], false);
        assert_eq!(out["review"]["severity"], "low");
        assert_eq!(out["review"]["model"], "review-model");
        assert_eq!(out["review"]["kinkId"], "k-1");

        let out = d
            .handle(json!({"input": {
                "action": "batch_review",
                "items": [
                    {"kinkId": "k-1", "name": "Rope", "sectionKey": "appeal", "content": "a"},
                    {"kinkId": "k-2", "sectionKey": "howTo", "content": "b"}
                ]
            }}))
            .await;
        assert_eq!(out["count"], 2);
        assert_eq!(out["reviews"][1]["kinkId"], "k-2");
        assert_eq!(out["reviews"][1]["sectionKey"], "howTo");
    }

    struct PanickingBackend;

    #[async_trait]
    impl CompletionBackend for PanickingBackend {
        async fn call_model(
            &self,
            _prompt: &str,
            _model: &str,
            _params: &CompletionParams,
        ) -> Option<String> {
            panic!("backend blew up");
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_handler_panic_becomes_error() {
        let d = dispatcher(Arc::new(PanickingBackend));
        let job = json!({"input": {"action": "generate", "kink": {"id": "k", "name": "n"}}});
        let out = d.handle(job).await;
        assert!(out["error"].as_str().unwrap().starts_with("job handler crashed"));

        // Still serving.
        let out = d.handle(json!({"input": {"action": "health"}})).await;
        assert_eq!(out["status"], "ok");
    }

    #[tokio::test]
    async fn test_health_reports_proxy() {
        use pleasance_core::config::ProxyConfig;
        use pleasance_providers::ProxyClient;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let proxy = ProxyClient::new(&ProxyConfig {
            base_url: server.uri(),
            ..Default::default()
        })
        .unwrap();
        let out = dispatcher(Arc::new(proxy))
            .handle(json!({"input": {"action": "health"}}))
            .await;
        assert_eq!(out, json!({"status": "ok", "proxy": true}));
    }
}
