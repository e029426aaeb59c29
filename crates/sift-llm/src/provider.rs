//! Provider trait and shared request/response types.

use async_trait::async_trait;

/// Result alias for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// One inference request.
///
/// Non-streaming: a step's inference call resolves to a single completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// Optional system context.
    pub system: Option<String>,
    /// Assembled prompt content.
    pub prompt: String,
    /// Output token ceiling for this call.
    pub max_tokens: u32,
}

/// A completed inference call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Generated content.
    pub content: String,
    /// Prompt-side tokens billed.
    pub input_tokens: u64,
    /// Generated tokens billed.
    pub output_tokens: u64,
    /// Model that produced the completion.
    pub model: String,
}

impl Completion {
    /// Total tokens billed for this call.
    #[must_use]
    pub fn tokens_used(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Provider call failures.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Credential problem (401/403 or malformed key).
    #[error("authentication failed: {message}")]
    Auth {
        /// Detail from the provider.
        message: String,
    },

    /// Non-success API response.
    #[error("api error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error body from the provider.
        message: String,
    },

    /// The request exceeded the configured deadline.
    #[error("request timed out")]
    Timeout,

    /// Transport-level failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body failed to parse.
    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    /// Success status but no usable content.
    #[error("provider returned an empty completion")]
    Empty,
}

impl ProviderError {
    /// Collapse a transport error into the timeout variant when applicable.
    #[must_use]
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

/// An inference backend.
///
/// Implementations must be safe to share across orchestration tasks; the
/// gateway holds one primary and one fallback behind `Arc<dyn Provider>`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short provider name for logs and the outcome record.
    fn name(&self) -> &'static str;

    /// Model this provider is configured for.
    fn model(&self) -> &str;

    /// Perform one inference call.
    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<Completion>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_used_sums_both_sides() {
        let completion = Completion {
            content: "X".into(),
            input_tokens: 120,
            output_tokens: 80,
            model: "m".into(),
        };
        assert_eq!(completion.tokens_used(), 200);
    }

    #[test]
    fn error_display_includes_status() {
        let err = ProviderError::Api {
            status: 529,
            message: "overloaded".into(),
        };
        let text = err.to_string();
        assert!(text.contains("529"));
        assert!(text.contains("overloaded"));
    }
}
