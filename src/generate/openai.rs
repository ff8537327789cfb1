use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{GenerationRequest, TextGenerator};
use crate::config::OpenAiConfig;
use crate::error::{KataribeError, Result};
use crate::http::{DEFAULT_TIMEOUT, build_client, ensure_success};

const SERVICE: &str = "OpenAI";

#[derive(Debug, Serialize)]
struct ResponsesRequest<'a> {
    model: &'a str,
    input: Vec<InputMessage<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
}

#[derive(Debug, Serialize)]
struct InputMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Tool {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl ResponsesResponse {
    /// Equivalent of the SDK's `output_text`: all output_text parts of message items
    fn output_text(&self) -> String {
        self.output
            .iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content.iter())
            .filter(|part| part.kind == "output_text")
            .map(|part| part.text.as_str())
            .collect()
    }
}

/// OpenAI Responses API generator
pub struct OpenAiGenerator {
    client: Client,
    config: OpenAiConfig,
    api_key: String,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiConfig, api_key: &str) -> Result<Self> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            config,
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut input = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            input.push(InputMessage {
                role: "system",
                content: system,
            });
        }
        input.push(InputMessage {
            role: "user",
            content: &request.prompt,
        });

        let tools = if self.config.web_search {
            vec![Tool { kind: "web_search" }]
        } else {
            Vec::new()
        };

        let body = ResponsesRequest {
            model: &self.config.model,
            input,
            tools,
        };

        let url = format!("{}/v1/responses", self.config.base_url.trim_end_matches('/'));
        info!("Requesting {} response (web search: {})", self.config.model, self.config.web_search);
        debug!("Sending generation request to: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = ensure_success(SERVICE, response).await?;
        let parsed: ResponsesResponse = response.json().await?;

        let text = parsed.output_text();
        if text.trim().is_empty() {
            return Err(KataribeError::service(SERVICE, "response contained no output text"));
        }
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}
