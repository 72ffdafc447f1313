//! Best-effort JSON extraction from free-form model output.
//!
//! Models asked for a JSON verdict usually wrap it in prose ("Sure, here is
//! the review: {...} Let me know…"). We take everything from the first `{`
//! to the last `}` and parse that. This is deliberately lenient; it is not a
//! schema validator.

use serde_json::{Map, Value};
use thiserror::Error;

/// Why no JSON object could be pulled out of a piece of text.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No `{ … }` span in the text.
    #[error("no JSON object found in model output")]
    NoObject,
    /// The `{ … }` span is not valid JSON.
    #[error("invalid JSON in model output: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Extract the JSON object embedded in `text`.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, ExtractError> {
    let start = text.find('{').ok_or(ExtractError::NoObject)?;
    let end = text.rfind('}').ok_or(ExtractError::NoObject)?;
    if end <= start {
        return Err(ExtractError::NoObject);
    }

    Ok(serde_json::from_str(&text[start..=end])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_wrapped_object() {
        let text = r#"sure, here: {"approved": false, "issues": ["x"]} thanks"#;
        let obj = extract_json_object(text).unwrap();
        assert_eq!(Value::Object(obj), json!({"approved": false, "issues": ["x"]}));
    }

    #[test]
    fn test_extract_nested_braces() {
        let text = "```json\n{\"a\": {\"b\": 1}}\n```";
        let obj = extract_json_object(text).unwrap();
        assert_eq!(obj["a"]["b"], 1);
    }

    #[test]
    fn test_no_braces() {
        assert!(matches!(
            extract_json_object("no json here"),
            Err(ExtractError::NoObject)
        ));
    }

    #[test]
    fn test_reversed_braces() {
        assert!(matches!(
            extract_json_object("} oops {"),
            Err(ExtractError::NoObject)
        ));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            extract_json_object("{approved: yes}"),
            Err(ExtractError::Parse(_))
        ));
    }

    #[test]
    fn test_two_objects_span_is_invalid() {
        // First `{` to last `}` covers both objects, which is not valid JSON.
        let err = extract_json_object(r#"{"a": 1} and {"b": 2}"#).unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}
