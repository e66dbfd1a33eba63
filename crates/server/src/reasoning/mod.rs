//! Client for the external reasoning (LLM) service.

use async_trait::async_trait;

mod anthropic;

pub use anthropic::{AnthropicClient, ReasoningConfig};

/// Token usage as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> i32 {
        i32::try_from(self.input_tokens.saturating_add(self.output_tokens)).unwrap_or(i32::MAX)
    }
}

#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("reasoning service unreachable: {0}")]
    Transport(String),
    #[error("reasoning service returned HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("reasoning service returned an empty reply")]
    EmptyReply,
    #[error("could not decode reasoning reply: {0}")]
    Decode(String),
    #[error("reasoning service is not configured: {0}")]
    NotConfigured(&'static str),
}

#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Ask the model `prompt` about `context`, generating at most `max_tokens`.
    async fn complete(
        &self,
        prompt: &str,
        context: &str,
        max_tokens: u32,
    ) -> Result<Completion, ReasoningError>;

    /// Model identifier recorded on analyses before a reply is available.
    fn model(&self) -> &str;
}
