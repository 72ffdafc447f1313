//! Configuration schema.
//!
//! Hierarchy: `Config` → `ProxyConfig`, `CatalogConfig`, `GenerationConfig`,
//! `ReviewConfig`, `BatchConfig`, plus the chain overrides map.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration — loaded from `~/.pleasance/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub proxy: ProxyConfig,
    pub catalog: CatalogConfig,
    pub generation: GenerationConfig,
    pub review: ReviewConfig,
    pub batch: BatchConfig,
    /// Chain overrides: chain name → ordered model list. Built-in chains not
    /// listed here keep their defaults.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub chains: BTreeMap<String, Vec<String>>,
}

// ─────────────────────────────────────────────
// Proxy
// ─────────────────────────────────────────────

/// The LLM proxy every completion goes through.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProxyConfig {
    pub base_url: String,
    /// Opaque token forwarded as a bearer credential, if the proxy wants one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Ceiling for one completion call.
    pub call_timeout_secs: u64,
    /// Ceiling for a `/health` probe.
    pub health_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://proxy.pleasance.app".to_string(),
            api_key: None,
            call_timeout_secs: 120,
            health_timeout_secs: 5,
        }
    }
}

// ─────────────────────────────────────────────
// Content API
// ─────────────────────────────────────────────

/// The content catalog API (queue, sections, mark-processed).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CatalogConfig {
    pub base_url: String,
    /// Sent as `X-Agent-Key`. Writes are refused without it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_secret: Option<String>,
    /// Sent as `X-Agent-Id`.
    pub agent_id: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.pleasance.app".to_string(),
            agent_secret: None,
            agent_id: format!("pleasance-worker-{}", std::process::id()),
        }
    }
}

impl CatalogConfig {
    /// Whether an agent secret is configured.
    pub fn has_credentials(&self) -> bool {
        self.agent_secret.as_deref().is_some_and(|s| !s.is_empty())
    }
}

// ─────────────────────────────────────────────
// Generation / review
// ─────────────────────────────────────────────

/// A section key and the prompt template used to write it.
///
/// Templates may use `{name}` and `{category}` placeholders.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionTemplate {
    pub key: String,
    pub template: String,
}

impl SectionTemplate {
    pub fn new(key: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            template: template.into(),
        }
    }
}

/// The built-in section templates, in generation order.
pub fn default_sections() -> Vec<SectionTemplate> {
    vec![
        SectionTemplate::new(
            "appeal",
            "Write a compelling 2-3 paragraph description of why people find '{name}' appealing. \n\
             Focus on psychological and sensory aspects. Be educational and non-judgmental.",
        ),
        SectionTemplate::new(
            "howTo",
            "Write a practical guide for safely exploring '{name}' as beginners. \n\
             Include safety considerations, communication tips, and gradual progression suggestions.",
        ),
        SectionTemplate::new(
            "variations",
            "Describe 3-5 common variations or related practices to '{name}'. \n\
             Be specific but tasteful. Include intensity levels.",
        ),
    ]
}

/// Settings for section generation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationConfig {
    /// Fallback chain used for bulk generation.
    pub chain: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Section templates, in the order sections are generated.
    pub sections: Vec<SectionTemplate>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            chain: "fast".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            sections: default_sections(),
        }
    }
}

/// Settings for quality review.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewConfig {
    /// Fallback chain used for reviews (needs a stronger model).
    pub chain: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Replaces the built-in review prompt. Placeholders: `{name}`,
    /// `{section_key}`, `{content}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            chain: "standard".to_string(),
            max_tokens: 2048,
            temperature: 0.7,
            prompt: None,
        }
    }
}

// ─────────────────────────────────────────────
// Batch
// ─────────────────────────────────────────────

/// Batch execution policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BatchConfig {
    /// Subjects fetched per worker batch.
    pub size: usize,
    /// Maximum in-flight items per batch. `0` means no cap.
    pub concurrency: usize,
    /// Wall-clock ceiling for a whole batch. Items still running when it
    /// expires are reported as failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline_secs: Option<u64>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: 10,
            concurrency: 0,
            deadline_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.proxy.call_timeout_secs, 120);
        assert_eq!(config.proxy.health_timeout_secs, 5);
        assert_eq!(config.generation.chain, "fast");
        assert_eq!(config.review.chain, "standard");
        assert_eq!(config.batch.size, 10);
        assert!(config.chains.is_empty());

        let keys: Vec<_> = config.generation.sections.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, ["appeal", "howTo", "variations"]);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{"proxy": {"baseUrl": "http://localhost:8080"}, "batch": {"concurrency": 4}}"#,
        )
        .unwrap();
        assert_eq!(config.proxy.base_url, "http://localhost:8080");
        assert_eq!(config.proxy.call_timeout_secs, 120);
        assert_eq!(config.batch.concurrency, 4);
        assert_eq!(config.batch.size, 10);
    }

    #[test]
    fn test_has_credentials() {
        let mut catalog = CatalogConfig::default();
        assert!(!catalog.has_credentials());
        catalog.agent_secret = Some(String::new());
        assert!(!catalog.has_credentials());
        catalog.agent_secret = Some("s3cret".into());
        assert!(catalog.has_credentials());
    }
}
