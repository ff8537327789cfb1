// Text generation providers
//
// Every provider implements TextGenerator so the report, script, blog and
// subtitle correction stages never depend on a concrete API:
// - OpenAI: Responses API, optionally with the hosted web search tool
// - Anthropic: Messages API
// - Gemini: generateContent
// - Ollama: local /api/generate

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{Credentials, GenerationConfig, Provider, Service};
use crate::error::Result;

/// A single prompt for a text generator
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub system: Option<String>,
    pub prompt: String,
}

impl GenerationRequest {
    pub fn new<S: Into<String>>(prompt: S) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
        }
    }

    pub fn with_system<S: Into<String>>(mut self, system: S) -> Self {
        let system = system.into();
        self.system = (!system.trim().is_empty()).then_some(system);
        self
    }
}

/// Main trait for text generation
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for the request, returning the model's reply
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Provider name used in logs
    fn name(&self) -> &'static str;

    /// Fail early when a local backend is not ready; hosted APIs have nothing to check
    async fn check_availability(&self) -> Result<()> {
        Ok(())
    }
}

/// Factory for creating text generators
pub struct GeneratorFactory;

impl GeneratorFactory {
    pub fn create(
        provider: Provider,
        config: &GenerationConfig,
        credentials: &Credentials,
    ) -> Result<Arc<dyn TextGenerator>> {
        let generator: Arc<dyn TextGenerator> = match provider {
            Provider::OpenAi => Arc::new(openai::OpenAiGenerator::new(
                config.openai.clone(),
                credentials.require(Service::OpenAi)?,
            )?),
            Provider::Anthropic => Arc::new(anthropic::AnthropicGenerator::new(
                config.anthropic.clone(),
                credentials.require(Service::Anthropic)?,
            )?),
            Provider::Gemini => Arc::new(gemini::GeminiGenerator::new(
                config.gemini.clone(),
                credentials.require(Service::Gemini)?,
            )?),
            Provider::Ollama => Arc::new(ollama::OllamaGenerator::new(config.ollama.clone())?),
        };
        Ok(generator)
    }
}

/// Remove a surrounding markdown code fence (```lang ... ```) if the model added one
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed.to_string();
    };

    // drop the info string on the opening fence line
    match body.split_once('\n') {
        Some((_, inner)) => inner.trim().to_string(),
        None => body.trim().to_string(),
    }
}
