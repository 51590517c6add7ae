//! High-level suggestion client.

use crate::error::SuggestError;
use crate::json::extract_json;
use crate::provider::{self, Provider, REQUEST_TIMEOUT};
use crate::request::{ChatMessage, SuggestRequest};
use namescope_core::ElementKind;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
#[cfg(feature = "tracing")]
use tracing::info;

/// Ranked replacement-name candidates for one element.
///
/// `candidates` is an open mapping exactly as the service returned it
/// (typically `suggested_alias1`, `suggested_alias2`, ... but no key set or
/// count is guaranteed); `raw` keeps the unprocessed response text for
/// callers that want to log or debug it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    pub candidates: BTreeMap<String, String>,
    pub raw: String,
}

impl Suggestions {
    /// Candidate names in rank order. Keys sort by length before content so
    /// `suggested_alias10` follows `suggested_alias9`.
    pub fn ranked(&self) -> Vec<&str> {
        let mut keys: Vec<&String> = self.candidates.keys().collect();
        keys.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        keys.into_iter()
            .map(|k| self.candidates[k].as_str())
            .collect()
    }
}

/// Client for one provider/model pair. The API key is supplied by the
/// caller; this crate does not read credentials from the environment.
pub struct SuggestionClient {
    provider: Provider,
    model: String,
    api_key: String,
    http: Client,
}

impl SuggestionClient {
    pub fn new(
        provider: Provider,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, SuggestError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            provider,
            model: model.into(),
            api_key: api_key.into(),
            http,
        })
    }

    /// Asks the service for replacement names for the given element.
    ///
    /// The `(kind, code)` pair is exactly what a finding's underlying
    /// element already carries.
    pub fn suggest_aliases(
        &self,
        kind: ElementKind,
        code: &str,
    ) -> Result<Suggestions, SuggestError> {
        let request = SuggestRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(build_prompt(kind, code))],
            max_tokens: 1000,
            temperature: 1.0,
        };

        let response = provider::call(self.provider, &request, &self.api_key, &self.http)?;
        let raw = response.trim().to_string();
        let candidates = candidates_from_response(&raw)?;

        #[cfg(feature = "tracing")]
        info!(
            kind = %kind,
            count = candidates.len(),
            "suggestion service returned candidates"
        );

        Ok(Suggestions { candidates, raw })
    }
}

/// Keeps only string-valued entries; the service contract is a mapping of
/// ranked name candidates, anything else in the object is ignored.
fn candidates_from_response(raw: &str) -> Result<BTreeMap<String, String>, SuggestError> {
    let map = extract_json(raw)?;
    Ok(map
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::String(s) => Some((key, s)),
            _ => None,
        })
        .collect())
}

fn build_prompt(kind: ElementKind, code: &str) -> String {
    format!(
        "You are reviewing SQL code for proper semantics.\n\n\
         Given the following {kind}, suggest a couple of alias names that accurately \
         reflect its purpose from a semantic standpoint. Order them by appropriateness.\n\
         code:\n\
         ```\n\
         {code}\n\
         ```\n\n\
         Return a response in JSON format like the following:\n\
         {{\n\
             \"suggested_alias1\": \"first_appropriate_alias_name\",\n\
             \"suggested_alias2\": \"second_appropriate_alias_name\",\n\
             \"suggested_alias3\": \"third_appropriate_alias_name\"\n\
         }}"
    )
}
