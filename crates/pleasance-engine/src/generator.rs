//! Content generator — one generation or review item in, one result out.
//!
//! Everything that can go wrong for a single item ends up inside the returned
//! value: an unknown section or an exhausted chain becomes a `SectionResult`
//! with `error`, a failed or unparsable review becomes a fail-open verdict.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use pleasance_core::config::{Config, GenerationConfig, ReviewConfig};
use pleasance_core::types::{GenerationItem, ReviewItem, ReviewVerdict, SectionResult, Severity};
use pleasance_providers::{CompletionParams, FallbackChain, FallbackExecutor, JsonCompletionError};

use crate::prompts::PromptSet;

/// Error text for a generation whose chain ran out of models.
pub const ALL_MODELS_FAILED: &str = "All models failed";

/// Prefix of the error note on a fail-open review verdict.
pub const REVIEW_FAILED: &str = "Review failed, auto-approved";

/// Chain and call parameters for one kind of task.
#[derive(Clone, Debug)]
struct TaskSettings {
    chain: FallbackChain,
    params: CompletionParams,
}

/// Generates and reviews individual sections.
pub struct ContentGenerator {
    executor: FallbackExecutor,
    prompts: PromptSet,
    generation: TaskSettings,
    review: TaskSettings,
}

impl ContentGenerator {
    pub fn new(
        executor: FallbackExecutor,
        prompts: PromptSet,
        generation: &GenerationConfig,
        review: &ReviewConfig,
    ) -> Self {
        let generation = TaskSettings {
            chain: executor.chains().resolve(&generation.chain).clone(),
            params: CompletionParams::default()
                .with_max_tokens(generation.max_tokens)
                .with_temperature(generation.temperature),
        };
        let review = TaskSettings {
            chain: executor.chains().resolve(&review.chain).clone(),
            params: CompletionParams::default()
                .with_max_tokens(review.max_tokens)
                .with_temperature(review.temperature),
        };
        Self {
            executor,
            prompts,
            generation,
            review,
        }
    }

    pub fn from_config(executor: FallbackExecutor, config: &Config) -> Self {
        let prompts = PromptSet::from_config(&config.generation, &config.review);
        Self::new(executor, prompts, &config.generation, &config.review)
    }

    pub fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    /// Probe the completion backend; no model is called.
    pub async fn health_check(&self) -> bool {
        self.executor.backend().health_check().await
    }

    /// Write one section.
    pub async fn generate_section(&self, item: &GenerationItem) -> SectionResult {
        let Some(prompt) = self.prompts.section_prompt(
            &item.section_key,
            &item.subject_name,
            item.category.as_deref(),
        ) else {
            return SectionResult::failed(item, format!("Unknown section: {}", item.section_key));
        };

        debug!(
            subject = %item.subject_name,
            section = %item.section_key,
            "Generating section"
        );

        let result = self
            .executor
            .complete(&prompt, &self.generation.chain, &self.generation.params)
            .await;

        match (result.text, result.model) {
            (Some(text), Some(model)) => SectionResult::generated(item, text, model),
            _ => {
                warn!(
                    subject = %item.subject_id,
                    section = %item.section_key,
                    fallbacks_used = result.fallbacks_used,
                    "Section generation failed"
                );
                SectionResult::failed(item, ALL_MODELS_FAILED)
            }
        }
    }

    /// Review one section. Never blocks the content: failures approve it with a note.
    pub async fn review_section(&self, item: &ReviewItem) -> ReviewVerdict {
        let prompt = self
            .prompts
            .review_prompt(&item.subject_name, &item.section_key, &item.content);

        let outcome = self
            .executor
            .complete_json(&prompt, &self.review.chain, &self.review.params)
            .await;

        let parsed = match outcome {
            Ok(json) => parse_verdict(item, json.object, json.model),
            Err(JsonCompletionError::Exhausted { fallbacks_used }) => {
                Err(format!("all {fallbacks_used} models failed"))
            }
            Err(e @ JsonCompletionError::Extraction { .. }) => Err(e.to_string()),
        };

        parsed.unwrap_or_else(|reason| {
            warn!(
                subject = %item.subject_id,
                section = %item.section_key,
                reason = %reason,
                "Review failed, approving"
            );
            ReviewVerdict::fail_open(item, format!("{REVIEW_FAILED}: {reason}"))
        })
    }
}

/// Turn a model's `{approved, issues, severity}` object into a verdict.
///
/// Lenient on everything except `approved`, which must be a boolean.
fn parse_verdict(
    item: &ReviewItem,
    object: Map<String, Value>,
    model: String,
) -> Result<ReviewVerdict, String> {
    let approved = object
        .get("approved")
        .and_then(Value::as_bool)
        .ok_or_else(|| format!("{model} gave no boolean 'approved'"))?;

    let issues = match object.get("issues") {
        Some(Value::Array(list)) => list
            .iter()
            .map(|issue| match issue {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    };

    let severity = object
        .get("severity")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Severity>().ok())
        .unwrap_or_default();

    Ok(ReviewVerdict {
        subject_id: item.subject_id.clone(),
        section_key: item.section_key.clone(),
        approved,
        issues,
        severity,
        model: Some(model),
        error: None,
    })
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
