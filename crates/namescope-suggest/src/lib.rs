//! Client for the alias suggestion service.
//!
//! Given a flagged element's type and defining code, asks a text-generation
//! provider for ranked replacement names. The response is treated as an open
//! mapping of string keys to string values: no fixed key set or candidate
//! count is assumed.

pub mod client;
pub mod error;
pub mod json;
pub mod provider;
pub mod request;

pub use client::{Suggestions, SuggestionClient};
pub use error::SuggestError;
pub use json::extract_json;
pub use provider::Provider;
pub use request::{ChatMessage, Role, SuggestRequest};
