//! Core value types — everything that flows between the proxy, the batch
//! orchestrator, the job dispatcher, and the content API.
//!
//! Wire names follow the content API (`kinkId`, `sectionKey`, `pageSections`),
//! Rust names follow the domain (`subject_id`, `section_key`, …).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Completion result
// ─────────────────────────────────────────────

/// Outcome of running one prompt through a fallback chain.
///
/// `success` is true exactly when both `text` and `model` are present.
/// Build it with [`CompletionResult::succeeded`] or [`CompletionResult::exhausted`]
/// so that the invariant cannot be broken.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionResult {
    pub text: Option<String>,
    pub model: Option<String>,
    /// Number of models that failed before the result was decided.
    pub fallbacks_used: usize,
    pub success: bool,
}

impl CompletionResult {
    /// A model at position `fallbacks_used` in the chain produced `text`.
    pub fn succeeded(
        text: impl Into<String>,
        model: impl Into<String>,
        fallbacks_used: usize,
    ) -> Self {
        Self {
            text: Some(text.into()),
            model: Some(model.into()),
            fallbacks_used,
            success: true,
        }
    }

    /// Every model of a chain of `chain_len` entries failed.
    pub fn exhausted(chain_len: usize) -> Self {
        Self {
            text: None,
            model: None,
            fallbacks_used: chain_len,
            success: false,
        }
    }
}

// ─────────────────────────────────────────────
// Subjects (queue items from the content API)
// ─────────────────────────────────────────────

/// One catalog topic as returned by the content API queue.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: String,
    #[serde(default = "unknown_name")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Existing sections (only populated for already-processed subjects).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_sections: Vec<PageSection>,
}

/// Name used for subjects that arrive without one.
pub const UNKNOWN_NAME: &str = "Unknown";

fn unknown_name() -> String {
    UNKNOWN_NAME.to_string()
}

impl Subject {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// One generation item for this subject and `section_key`.
    pub fn generation_item(&self, section_key: impl Into<String>) -> GenerationItem {
        GenerationItem {
            subject_id: self.id.clone(),
            subject_name: self.name.clone(),
            category: self.category.clone(),
            section_key: section_key.into(),
        }
    }

    /// Review items for every existing section that has content.
    pub fn review_items(&self) -> Vec<ReviewItem> {
        self.page_sections
            .iter()
            .filter_map(|section| {
                let content = section.content.as_deref().filter(|c| !c.is_empty())?;
                Some(ReviewItem {
                    subject_id: self.id.clone(),
                    subject_name: self.name.clone(),
                    section_key: section.section_key.clone(),
                    content: content.to_string(),
                })
            })
            .collect()
    }
}

/// A section already stored on a subject page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSection {
    pub section_key: String,
    #[serde(default)]
    pub content: Option<String>,
}

// ─────────────────────────────────────────────
// Generation
// ─────────────────────────────────────────────

/// One piece of content to produce: a subject and the section to write for it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationItem {
    #[serde(rename = "kinkId")]
    pub subject_id: String,
    #[serde(rename = "name")]
    pub subject_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub section_key: String,
}

/// Result for one [`GenerationItem`]; pushed as-is to the content API.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionResult {
    #[serde(rename = "kinkId")]
    pub subject_id: String,
    pub section_key: String,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SectionResult {
    pub fn generated(item: &GenerationItem, content: String, model: String) -> Self {
        Self {
            subject_id: item.subject_id.clone(),
            section_key: item.section_key.clone(),
            content: Some(content),
            model: Some(model),
            error: None,
        }
    }

    pub fn failed(item: &GenerationItem, error: impl Into<String>) -> Self {
        Self {
            subject_id: item.subject_id.clone(),
            section_key: item.section_key.clone(),
            content: None,
            model: None,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.content.is_some()
    }
}

// ─────────────────────────────────────────────
// Review
// ─────────────────────────────────────────────

/// A stored section to quality-check.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewItem {
    #[serde(rename = "kinkId")]
    pub subject_id: String,
    #[serde(rename = "name", default)]
    pub subject_name: String,
    pub section_key: String,
    pub content: String,
}

/// How serious the issues found by a review are.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Severity::None),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Verdict for one [`ReviewItem`].
///
/// A verdict with `error` set is a fail-open substitute: the review could not
/// be obtained or parsed, so the content is let through as approved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewVerdict {
    #[serde(rename = "kinkId")]
    pub subject_id: String,
    pub section_key: String,
    pub approved: bool,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReviewVerdict {
    /// Approved verdict annotated with why the real review is missing.
    pub fn fail_open(item: &ReviewItem, error: impl Into<String>) -> Self {
        Self {
            subject_id: item.subject_id.clone(),
            section_key: item.section_key.clone(),
            approved: true,
            issues: Vec::new(),
            severity: Severity::None,
            model: None,
            error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
