//! Fallback chain executor.
//!
//! Walks a [`FallbackChain`] in order and returns the first model's usable
//! text. A model that fails is never retried within the same call. When the
//! whole chain is exhausted the caller gets an explicit failure result, never
//! a panic or an error it could forget to handle.

use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, warn};

use pleasance_core::extract::{extract_json_object, ExtractError};
use pleasance_core::types::CompletionResult;

use crate::chains::{ChainRegistry, FallbackChain};
use crate::traits::{CompletionBackend, CompletionParams};

/// A JSON object obtained from a completion, with the model that wrote it.
#[derive(Clone, Debug, PartialEq)]
pub struct JsonCompletion {
    pub object: Map<String, Value>,
    pub model: String,
    pub fallbacks_used: usize,
}

#[derive(Debug, Error)]
pub enum JsonCompletionError {
    /// No model in the chain produced text.
    #[error("all {fallbacks_used} models failed")]
    Exhausted { fallbacks_used: usize },
    /// A model answered, but not with a JSON object.
    #[error("{model} returned no usable JSON: {source}")]
    Extraction {
        model: String,
        #[source]
        source: ExtractError,
    },
}

/// Runs prompts through fallback chains on a shared [`CompletionBackend`].
#[derive(Clone)]
pub struct FallbackExecutor {
    backend: Arc<dyn CompletionBackend>,
    chains: Arc<ChainRegistry>,
}

impl FallbackExecutor {
    pub fn new(backend: Arc<dyn CompletionBackend>, chains: Arc<ChainRegistry>) -> Self {
        Self { backend, chains }
    }

    pub fn backend(&self) -> &Arc<dyn CompletionBackend> {
        &self.backend
    }

    pub fn chains(&self) -> &ChainRegistry {
        &self.chains
    }

    /// Try each model of `chain` in order until one yields text.
    pub async fn complete(
        &self,
        prompt: &str,
        chain: &FallbackChain,
        params: &CompletionParams,
    ) -> CompletionResult {
        let models = chain.models();

        for (i, model) in models.iter().enumerate() {
            if let Some(text) = self
                .backend
                .call_model(prompt, model, params)
                .await
                .filter(|t| !t.trim().is_empty())
            {
                if i > 0 {
                    debug!(model = %model, fallbacks_used = i, "Fallback model succeeded");
                }
                return CompletionResult::succeeded(text, model.as_str(), i);
            }

            if let Some(next) = models.get(i + 1) {
                warn!(model = %model, next = %next, "Model failed, trying next in chain");
            }
        }

        error!(chain_len = models.len(), "All models in chain failed");
        CompletionResult::exhausted(models.len())
    }

    /// [`complete`](Self::complete) on a chain looked up by name. Unknown
    /// names fall back to the standard chain.
    pub async fn complete_named(
        &self,
        prompt: &str,
        chain_name: &str,
        params: &CompletionParams,
    ) -> CompletionResult {
        let chain = self.chains.resolve(chain_name);
        self.complete(prompt, chain, params).await
    }

    /// Complete, then pull a JSON object out of the answer.
    pub async fn complete_json(
        &self,
        prompt: &str,
        chain: &FallbackChain,
        params: &CompletionParams,
    ) -> Result<JsonCompletion, JsonCompletionError> {
        let result = self.complete(prompt, chain, params).await;

        let (Some(text), Some(model)) = (result.text, result.model) else {
            return Err(JsonCompletionError::Exhausted {
                fallbacks_used: result.fallbacks_used,
            });
        };

        match extract_json_object(&text) {
            Ok(object) => Ok(JsonCompletion {
                object,
                model,
                fallbacks_used: result.fallbacks_used,
            }),
            Err(source) => Err(JsonCompletionError::Extraction { model, source }),
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
