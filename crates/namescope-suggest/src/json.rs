//! Lenient JSON extraction from free-form model output.
//!
//! Models wrap JSON in prose, code fences, or single quotes. This pulls the
//! first `{...}` block out of the text and parses it, retrying with
//! single-to-double quote substitution before giving up.

use crate::error::SuggestError;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Extracts the first JSON object embedded in `text`.
///
/// Returns an empty map when the text contains no object at all; a present
/// but unparseable object is an error.
pub fn extract_json(text: &str) -> Result<Map<String, Value>, SuggestError> {
    static JSON_BLOCK: OnceLock<Regex> = OnceLock::new();
    let re = JSON_BLOCK.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("Invalid regex pattern"));

    let Some(block) = re.find(text) else {
        return Ok(Map::new());
    };
    let raw = block.as_str();

    let parsed: Value = serde_json::from_str(raw)
        .or_else(|_| serde_json::from_str(&raw.replace('\'', "\"")))
        .map_err(|_| SuggestError::InvalidResponse("invalid JSON in model output".to_string()))?;

    match parsed {
        Value::Object(map) => Ok(map),
        _ => Err(SuggestError::InvalidResponse(
            "model output is not a JSON object".to_string(),
        )),
    }
}
