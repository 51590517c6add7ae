//! Provider adapters.
//!
//! Each adapter serializes the canonical [`SuggestRequest`] into the
//! provider's wire format, posts it, and returns the completion text. On a
//! non-success status the response body is surfaced verbatim in the error.

use crate::error::SuggestError;
use crate::request::{Role, SuggestRequest};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Timeout applied to every suggestion call; the core pipeline itself has no
/// timeout semantics, this boundary owns them.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenAi => f.write_str("openai"),
            Self::Anthropic => f.write_str("anthropic"),
            Self::Google => f.write_str("google"),
        }
    }
}

impl FromStr for Provider {
    type Err = SuggestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "google" => Ok(Self::Google),
            other => Err(SuggestError::InvalidRequest(format!(
                "unknown provider: {other}"
            ))),
        }
    }
}

/// Posts the request to the chosen provider and returns the completion text.
pub fn call(
    provider: Provider,
    request: &SuggestRequest,
    api_key: &str,
    http: &Client,
) -> Result<String, SuggestError> {
    request.validate()?;
    match provider {
        Provider::OpenAi => call_openai(request, api_key, http),
        Provider::Anthropic => call_anthropic(request, api_key, http),
        Provider::Google => call_google(request, api_key, http),
    }
}

fn call_openai(request: &SuggestRequest, api_key: &str, http: &Client) -> Result<String, SuggestError> {
    let response = http
        .post("https://api.openai.com/v1/chat/completions")
        .bearer_auth(api_key)
        .json(&openai_payload(request))
        .send()?;
    let body = success_body(Provider::OpenAi, response)?;
    openai_content(&parse_body(&body)?)
}

fn call_anthropic(
    request: &SuggestRequest,
    api_key: &str,
    http: &Client,
) -> Result<String, SuggestError> {
    let response = http
        .post("https://api.anthropic.com/v1/messages")
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .json(&anthropic_payload(request))
        .send()?;
    let body = success_body(Provider::Anthropic, response)?;
    anthropic_content(&parse_body(&body)?)
}

fn call_google(request: &SuggestRequest, api_key: &str, http: &Client) -> Result<String, SuggestError> {
    let url = format!(
        "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
        request.model, api_key
    );
    let response = http.post(url).json(&google_payload(request)).send()?;
    let body = success_body(Provider::Google, response)?;
    google_content(&parse_body(&body)?)
}

fn success_body(
    provider: Provider,
    response: reqwest::blocking::Response,
) -> Result<String, SuggestError> {
    let status = response.status();
    let body = response.text()?;
    if status.is_success() {
        Ok(body)
    } else {
        Err(SuggestError::Api {
            provider,
            status: status.as_u16(),
            body,
        })
    }
}

fn parse_body(body: &str) -> Result<Value, SuggestError> {
    serde_json::from_str(body)
        .map_err(|e| SuggestError::InvalidResponse(format!("response is not JSON: {e}")))
}

fn openai_payload(request: &SuggestRequest) -> Value {
    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({ "role": role_name(m.role), "content": m.content }))
        .collect();
    json!({
        "model": request.model,
        "messages": messages,
        "max_completion_tokens": request.max_tokens,
        "temperature": request.temperature,
    })
}

fn anthropic_payload(request: &SuggestRequest) -> Value {
    let messages: Vec<Value> = request
        .without_system_messages()
        .map(|m| json!({ "role": role_name(m.role), "content": m.content }))
        .collect();
    let mut payload = json!({
        "model": request.model,
        "messages": messages,
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
    });
    if let Some(system) = request.system_text() {
        payload["system"] = Value::String(system);
    }
    payload
}

fn google_payload(request: &SuggestRequest) -> Value {
    let contents: Vec<Value> = request
        .messages
        .iter()
        .map(|m| {
            let role = if m.role == Role::Assistant {
                "model"
            } else {
                "user"
            };
            json!({ "role": role, "parts": [{ "text": m.content }] })
        })
        .collect();
    json!({
        "contents": contents,
        "generationConfig": {
            "temperature": request.temperature,
            "maxOutputTokens": request.max_tokens,
        },
    })
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

fn openai_content(value: &Value) -> Result<String, SuggestError> {
    value["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SuggestError::InvalidResponse("missing choices[0].message.content".into()))
}

fn anthropic_content(value: &Value) -> Result<String, SuggestError> {
    value["content"][0]["text"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SuggestError::InvalidResponse("missing content[0].text".into()))
}

fn google_content(value: &Value) -> Result<String, SuggestError> {
    value["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            SuggestError::InvalidResponse("missing candidates[0].content.parts[0].text".into())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ChatMessage;

    fn request() -> SuggestRequest {
        SuggestRequest {
            model: "test-model".to_string(),
            messages: vec![
                ChatMessage::system("be terse"),
                ChatMessage::user("suggest names"),
            ],
            max_tokens: 500,
            temperature: 1.0,
        }
    }

    #[test]
    fn openai_payload_shape() {
        let payload = openai_payload(&request());
        assert_eq!(payload["model"], "test-model");
        assert_eq!(payload["max_completion_tokens"], 500);
        assert_eq!(payload["messages"][0]["role"], "system");
        assert_eq!(payload["messages"][1]["content"], "suggest names");
    }

    #[test]
    fn anthropic_payload_separates_system() {
        let payload = anthropic_payload(&request());
        assert_eq!(payload["system"], "be terse");
        assert_eq!(payload["messages"].as_array().unwrap().len(), 1);
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["max_tokens"], 500);
    }

    #[test]
    fn google_payload_maps_roles_to_user_and_model() {
        let mut req = request();
        req.messages.push(ChatMessage {
            role: Role::Assistant,
            content: "previous answer".to_string(),
        });
        let payload = google_payload(&req);
        let contents = payload["contents"].as_array().unwrap();
        assert_eq!(contents[0]["role"], "user"); // system folds into user
        assert_eq!(contents[2]["role"], "model");
        assert_eq!(payload["generationConfig"]["maxOutputTokens"], 500);
    }

    #[test]
    fn openai_content_extraction() {
        let value: Value = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#,
        )
        .unwrap();
        assert_eq!(openai_content(&value).unwrap(), "hello");
        assert!(openai_content(&json!({"choices": []})).is_err());
    }

    #[test]
    fn anthropic_content_extraction() {
        let value: Value =
            serde_json::from_str(r#"{"content":[{"type":"text","text":"hi"}]}"#).unwrap();
        assert_eq!(anthropic_content(&value).unwrap(), "hi");
    }

    #[test]
    fn google_content_extraction() {
        let value: Value = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"answer"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(google_content(&value).unwrap(), "answer");
    }

    #[test]
    fn provider_round_trips_through_names() {
        for provider in [Provider::OpenAi, Provider::Anthropic, Provider::Google] {
            assert_eq!(provider.to_string().parse::<Provider>().unwrap(), provider);
        }
        assert!("mistral".parse::<Provider>().is_err());
    }
}
