use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{GenerationRequest, TextGenerator};
use crate::config::OllamaConfig;
use crate::error::{KataribeError, Result};
use crate::http::{DEFAULT_TIMEOUT, build_client, ensure_success};

const SERVICE: &str = "Ollama";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Local Ollama generator
pub struct OllamaGenerator {
    client: Client,
    config: OllamaConfig,
}

impl OllamaGenerator {
    pub fn new(config: OllamaConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(DEFAULT_TIMEOUT)?,
            config,
        })
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = GenerateRequest {
            model: &self.config.model,
            system: request.system.as_deref(),
            prompt: &request.prompt,
            stream: false,
        };

        let url = format!("{}/api/generate", self.config.endpoint.trim_end_matches('/'));
        debug!("Sending generation request to: {}", url);

        let response = self.client.post(&url).json(&body).send().await?;
        let response = ensure_success(SERVICE, response).await?;
        let parsed: GenerateResponse = response.json().await?;

        let text = parsed.response.trim().to_string();
        if text.is_empty() {
            return Err(KataribeError::service(SERVICE, "empty response received"));
        }
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "ollama"
    }

    /// Check if Ollama is running and the configured model is pulled
    async fn check_availability(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.config.endpoint.trim_end_matches('/'));
        let response = self.client.get(&url).send().await.map_err(|e| {
            KataribeError::service(SERVICE, format!("Ollama not reachable at {}: {}", self.config.endpoint, e))
        })?;
        let response = ensure_success(SERVICE, response).await?;
        let tags: TagsResponse = response.json().await?;

        if tags.models.iter().any(|m| m.name == self.config.model) {
            info!("Ollama model {} is available", self.config.model);
            Ok(())
        } else {
            Err(KataribeError::service(
                SERVICE,
                format!("model '{}' not found, run: ollama pull {}", self.config.model, self.config.model),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(endpoint: String) -> OllamaConfig {
        OllamaConfig {
            endpoint,
            model: "llama-test".to_string(),
        }
    }

    #[tokio::test]
    async fn generates_without_streaming() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({"model": "llama-test", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "  生成結果  ",
                "done": true
            })))
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(config(server.uri())).unwrap();
        let text = generator.generate(&GenerationRequest::new("prompt")).await.unwrap();
        assert_eq!(text, "生成結果");
    }

    #[tokio::test]
    async fn availability_requires_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "other"}]
            })))
            .mount(&server)
            .await;

        let generator = OllamaGenerator::new(config(server.uri())).unwrap();
        assert!(generator.check_availability().await.is_err());
    }
}
