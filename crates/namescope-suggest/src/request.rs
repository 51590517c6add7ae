//! Provider-agnostic chat request.
//!
//! Provider differences stay out of this type; each adapter in
//! [`crate::provider`] serializes it into its own wire format.

use crate::error::SuggestError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Canonical request for a suggestion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl SuggestRequest {
    /// Checks the invariants every adapter relies on.
    pub fn validate(&self) -> Result<(), SuggestError> {
        if self.model.is_empty() {
            return Err(SuggestError::InvalidRequest(
                "model must be a non-empty string".to_string(),
            ));
        }
        if self.messages.is_empty() {
            return Err(SuggestError::InvalidRequest(
                "messages must be a non-empty list".to_string(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(SuggestError::InvalidRequest(
                "max_tokens must be positive".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(SuggestError::InvalidRequest(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }
        Ok(())
    }

    /// Concatenated system text, for providers that want `system` separated.
    pub fn system_text(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n"))
        }
    }

    pub fn without_system_messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }
}
