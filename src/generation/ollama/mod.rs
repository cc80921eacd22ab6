#[cfg(test)]
mod tests;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{GenerationProvider, render_prompt};
use crate::config::{GenerationConfig, ProviderBackend};
use crate::embeddings::ProviderIdentity;
use crate::http::{build_agent, post_json};
use crate::{QaError, Result};

/// Text generation through a local Ollama runtime (`/api/generate`)
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    base_url: Url,
    model: String,
    temperature: f32,
    max_tokens: u32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    done: bool,
}

impl OllamaGenerator {
    #[inline]
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let base_url = config
            .endpoint()
            .map_err(|e| QaError::Config(format!("Invalid Ollama URL: {}", e)))?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
        })
    }

    fn request_completion(&self, prompt: String) -> anyhow::Result<String> {
        let url = self
            .base_url
            .join("api/generate")
            .context("Failed to build generate URL")?;

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let response: GenerateResponse =
            post_json(&self.agent, &url, None, &request).context("Failed to generate answer")?;

        if !response.done {
            debug!("Ollama reported an unfinished generation");
        }

        Ok(response.response)
    }
}

impl GenerationProvider for OllamaGenerator {
    #[inline]
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity {
            backend: ProviderBackend::Ollama,
            model: self.model.clone(),
        }
    }

    #[inline]
    fn generate(&self, context: &str, question: &str) -> Result<String> {
        debug!(
            "Generating answer with {} ({} chars of context)",
            self.model,
            context.len()
        );

        self.request_completion(render_prompt(context, question))
            .map(|answer| answer.trim().to_string())
            .map_err(|e| QaError::GenerationProvider(format!("{:#}", e)))
    }
}
