
use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{GenerationProvider, render_system_message};
use crate::config::{GenerationConfig, ProviderBackend};
use crate::embeddings::ProviderIdentity;
use crate::http::{ApiKey, build_agent, post_json};
use crate::{QaError, Result};

/// Chat-completion client for hosted OpenAI-compatible APIs (OpenAI, Groq, ...)
#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    base_url: Url,
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key: ApiKey,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    #[inline]
    pub fn new(config: &GenerationConfig, api_key: ApiKey) -> Result<Self> {
        let base_url = config
            .endpoint()
            .map_err(|e| QaError::Config(format!("Invalid chat API URL: {}", e)))?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
        })
    }

    fn request_completion(&self, context: &str, question: &str) -> anyhow::Result<String> {
        let url = self
            .base_url
            .join("chat/completions")
            .context("Failed to build chat completions URL")?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: render_system_message(context),
                },
                ChatMessage {
                    role: "user",
                    content: question.trim().to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: false,
        };

        let response: ChatResponse = post_json(&self.agent, &url, Some(&self.api_key), &request)
            .context("Failed to generate answer")?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Chat completion returned no message content"))
    }
}

impl GenerationProvider for OpenAiGenerator {
    #[inline]
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity {
            backend: ProviderBackend::OpenAi,
            model: self.model.clone(),
        }
    }

    #[inline]
    fn generate(&self, context: &str, question: &str) -> Result<String> {
        debug!(
            "Requesting chat completion from {} with model {}",
            self.base_url, self.model
        );

        self.request_completion(context, question)
            .map(|answer| answer.trim().to_string())
            .map_err(|e| QaError::GenerationProvider(format!("{:#}", e)))
    }
}
