use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Completion, ReasoningClient, ReasoningError, Usage};

const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct ReasoningConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl ReasoningConfig {
    /// `REASONING_API_URL`, `REASONING_API_KEY`, `REASONING_MODEL`.
    pub fn from_env(timeout_secs: u64) -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            api_url: var("REASONING_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: var("REASONING_API_KEY"),
            model: var("REASONING_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

/// Messages-API client.
pub struct AnthropicClient {
    config: ReasoningConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicClient {
    pub fn new(config: ReasoningConfig) -> Result<Self, ReasoningError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ReasoningError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }
}

/// Concatenate the text blocks of a reply.
fn reply_text(resp: &MessagesResponse) -> String {
    resp.content
        .iter()
        .filter(|b| b.kind == "text")
        .filter_map(|b| b.text.as_deref())
        .collect::<Vec<_>>()
        .join("")
}

#[async_trait]
impl ReasoningClient for AnthropicClient {
    #[tracing::instrument(skip(self, prompt, context), fields(prompt_chars = prompt.len(), context_chars = context.len()))]
    async fn complete(
        &self,
        prompt: &str,
        context: &str,
        max_tokens: u32,
    ) -> Result<Completion, ReasoningError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ReasoningError::NotConfigured("REASONING_API_KEY"))?;

        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens,
            system: context,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .client
            .post(&self.config.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ReasoningError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ReasoningError::Status {
                code: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| ReasoningError::Decode(e.to_string()))?;

        let text = reply_text(&parsed);
        if text.trim().is_empty() {
            return Err(ReasoningError::EmptyReply);
        }

        tracing::debug!(reply_chars = text.len(), "reasoning reply received");

        Ok(Completion {
            text,
            model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
            usage: parsed.usage.map(|u| Usage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
            }),
        })
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
