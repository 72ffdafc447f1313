//! Response normalizer — extracts generated text from whatever shape the
//! proxy hands back for a given model family.
//!
//! Shapes, checked in order:
//! 1. Anthropic messages: `{"content": [{"type": "text", "text": "…"}]}`
//! 2. Proxied Gemini: `{"text": "…"}`
//! 3. OpenAI chat: `{"choices": [{"message": {"content": "…"}}]}`

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// The body matches none of the known shapes.
    #[error("unrecognized response shape")]
    UnrecognizedShape,
    /// A shape matched but carried no text.
    #[error("response contained no text")]
    EmptyText,
}

/// Extract the generated text from a raw proxy response body.
pub fn extract_text(body: &Value) -> Result<String, NormalizeError> {
    let text = if let Some(blocks) = body
        .get("content")
        .and_then(Value::as_array)
        .filter(|blocks| !blocks.is_empty())
    {
        // Thinking models lead with a block that has no `text`.
        blocks
            .iter()
            .find_map(|block| block.get("text").and_then(Value::as_str))
    } else if let Some(text) = body.get("text") {
        text.as_str()
    } else if let Some(first) = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    {
        first
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
    } else {
        return Err(NormalizeError::UnrecognizedShape);
    };

    match text {
        Some(t) if !t.trim().is_empty() => Ok(t.to_string()),
        _ => Err(NormalizeError::EmptyText),
    }
}
