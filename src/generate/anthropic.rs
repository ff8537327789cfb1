use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{GenerationRequest, TextGenerator};
use crate::config::AnthropicConfig;
use crate::error::{KataribeError, Result};
use crate::http::{DEFAULT_TIMEOUT, build_client, ensure_success};

const SERVICE: &str = "Anthropic";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

/// Anthropic Messages API generator
pub struct AnthropicGenerator {
    client: Client,
    config: AnthropicConfig,
    api_key: String,
}

impl AnthropicGenerator {
    pub fn new(config: AnthropicConfig, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            config,
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            system: request.system.as_deref(),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
        };

        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        info!("Requesting {} message", self.config.model);
        debug!("Sending generation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;
        let parsed: MessagesResponse = response.json().await?;

        if parsed.stop_reason.as_deref() == Some("max_tokens") {
            debug!("Anthropic reply was cut at max_tokens ({})", self.config.max_tokens);
        }

        let text: String = parsed
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();

        if text.trim().is_empty() {
            return Err(KataribeError::service(SERVICE, "response contained no text blocks"));
        }
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}
