//! Fallback chain registry — the named, ordered model lists.
//!
//! The built-in chains live in [`BUILTIN_CHAINS`]; `config.chains` may replace
//! any of them or add new ones. A [`ChainRegistry`] is built once at startup
//! and never mutated afterwards.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::warn;

/// Chain used when a caller asks for a name that doesn't exist.
pub const DEFAULT_CHAIN: &str = "standard";

/// Models served by the proxy, by family.
pub static KNOWN_MODELS: &[(&str, &[&str])] = &[
    (
        "Claude",
        &[
            "claude-opus-4-5-thinking",
            "claude-sonnet-4-5",
            "claude-sonnet-4-5-thinking",
        ],
    ),
    (
        "Gemini",
        &[
            "gemini-3-flash",
            "gemini-3-pro-image",
            "gemini-2.5-flash",
            "gemini-2.5-flash-lite",
            "gemini-2.5-flash-thinking",
            "gemini-2.5-pro",
            "gemini-3-pro-high",
            "gemini-3-pro",
        ],
    ),
];

/// Built-in chains, highest priority model first.
pub static BUILTIN_CHAINS: &[(&str, &[&str])] = &[
    (
        "standard",
        &[
            "claude-sonnet-4-5",
            "gemini-2.5-flash",
            "gemini-2.5-pro",
            "gemini-3-flash",
        ],
    ),
    (
        "fast",
        &[
            "gemini-2.5-flash-lite",
            "gemini-2.5-flash",
            "gemini-3-flash",
            "claude-sonnet-4-5",
        ],
    ),
    (
        "deep",
        &[
            "claude-sonnet-4-5-thinking",
            "claude-opus-4-5-thinking",
            "gemini-2.5-pro",
            "gemini-3-pro-high",
        ],
    ),
    (
        "image",
        &["gemini-3-pro-image", "gemini-3-pro", "gemini-2.5-pro"],
    ),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("a fallback chain needs at least one model")]
    Empty,
}

// ─────────────────────────────────────────────
// FallbackChain
// ─────────────────────────────────────────────

/// An ordered, non-empty list of distinct model identifiers.
///
/// Duplicates are dropped at construction (first occurrence wins), so a model
/// that failed is never attempted again further down the same chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FallbackChain(Vec<String>);

impl FallbackChain {
    pub fn new<I, S>(models: I) -> Result<Self, ChainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for model in models.into_iter().map(Into::<String>::into) {
            let model = model.trim().to_string();
            if !model.is_empty() && !unique.contains(&model) {
                unique.push(model);
            }
        }
        if unique.is_empty() {
            return Err(ChainError::Empty);
        }
        Ok(Self(unique))
    }

    pub fn models(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for clippy's `len_without_is_empty`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ─────────────────────────────────────────────
// ChainRegistry
// ─────────────────────────────────────────────

/// Named chains available at runtime.
#[derive(Clone, Debug)]
pub struct ChainRegistry {
    chains: BTreeMap<String, FallbackChain>,
    /// Snapshot of [`DEFAULT_CHAIN`] taken at construction.
    fallback: FallbackChain,
}

impl Default for ChainRegistry {
    fn default() -> Self {
        let chains: BTreeMap<String, FallbackChain> = BUILTIN_CHAINS
            .iter()
            .map(|(name, models)| {
                let models = models.iter().map(|m| m.to_string()).collect();
                (name.to_string(), FallbackChain(models))
            })
            .collect();
        let fallback = chains[DEFAULT_CHAIN].clone();
        Self { chains, fallback }
    }
}

impl ChainRegistry {
    /// Built-in chains with `overrides` applied on top.
    ///
    /// An override with no usable model is ignored (with a warning) so a typo
    /// in the config can't leave a chain empty.
    pub fn from_config(overrides: &BTreeMap<String, Vec<String>>) -> Self {
        let mut registry = Self::default();
        for (name, models) in overrides {
            match FallbackChain::new(models.iter().cloned()) {
                Ok(chain) => {
                    if name == DEFAULT_CHAIN {
                        registry.fallback = chain.clone();
                    }
                    registry.chains.insert(name.clone(), chain);
                }
                Err(e) => warn!(chain = %name, "Ignoring chain override: {}", e),
            }
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&FallbackChain> {
        self.chains.get(name)
    }

    /// Look up `name`, falling back to [`DEFAULT_CHAIN`] if it doesn't exist.
    pub fn resolve(&self, name: &str) -> &FallbackChain {
        if let Some(chain) = self.chains.get(name) {
            return chain;
        }
        warn!(chain = %name, "Unknown chain, using '{}'", DEFAULT_CHAIN);
        &self.fallback
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FallbackChain)> {
        self.chains.iter().map(|(k, v)| (k.as_str(), v))
    }
}
