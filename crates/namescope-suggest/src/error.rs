use crate::provider::Provider;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SuggestError {
    /// The request failed local validation before anything was sent.
    #[error("invalid suggestion request: {0}")]
    InvalidRequest(String),

    /// Transport-level failure (connection, timeout, TLS).
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status. The response body is
    /// surfaced verbatim so the provider's own diagnostic is never lost.
    #[error("{provider} HTTP {status} error: {body}")]
    Api {
        provider: Provider,
        status: u16,
        body: String,
    },

    /// The provider answered 2xx but the payload did not have the expected
    /// shape.
    #[error("unusable suggestion response: {0}")]
    InvalidResponse(String),
}
