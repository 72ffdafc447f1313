//! Pleasance core — value types, configuration, and JSON extraction shared by
//! every other crate in the workspace.
//!
//! - [`types`] — subjects, generation/review items, section results, verdicts
//! - [`config`] — typed schema, JSON loader, env var overrides
//! - [`extract`] — best-effort JSON object extraction from model output

pub mod config;
pub mod extract;
pub mod types;
pub mod utils;

pub use extract::{extract_json_object, ExtractError};
pub use types::{
    CompletionResult, GenerationItem, PageSection, ReviewItem, ReviewVerdict, SectionResult,
    Severity, Subject,
};
