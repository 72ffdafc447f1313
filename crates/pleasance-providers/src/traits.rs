//! Completion backend trait — the seam between the fallback executor and the
//! network.
//!
//! `ProxyClient` is the real implementation; tests substitute stubs that fail
//! on chosen models.

use async_trait::async_trait;

/// Parameters passed to each model call.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionParams {
    /// Maximum tokens to generate (always ≥ 1).
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 1.0).
    pub temperature: f64,
    /// Optional system prompt.
    pub system: Option<String>,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.7,
            system: None,
        }
    }
}

impl CompletionParams {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens.max(1);
        self
    }

    /// Set the temperature, clamped into `[0, 1]`. NaN falls back to the default.
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = if temperature.is_nan() {
            Self::default().temperature
        } else {
            temperature.clamp(0.0, 1.0)
        };
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// One completion request to one named model.
///
/// Implementations never return an error: any failure (HTTP status, transport,
/// timeout, unrecognised body) collapses to `None` so the caller simply moves
/// on to the next model.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run `prompt` on `model`. Returns the generated text, or `None`.
    async fn call_model(&self, prompt: &str, model: &str, params: &CompletionParams)
        -> Option<String>;

    /// Whether the backend is reachable. No model is called.
    async fn health_check(&self) -> bool;
}
