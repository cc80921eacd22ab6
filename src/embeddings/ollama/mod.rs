
use anyhow::{Context, Result as AnyResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{EmbeddingProvider, ProviderIdentity, check_batch};
use crate::config::{EmbeddingConfig, ProviderBackend};
use crate::http::{build_agent, get_text, post_json};
use crate::{QaError, Result};

/// Embedding client for a local Ollama runtime
#[derive(Debug, Clone)]
pub struct OllamaEmbeddings {
    base_url: Url,
    model: String,
    batch_size: u32,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: Option<u64>,
    pub digest: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

impl OllamaEmbeddings {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base_url = config
            .endpoint()
            .map_err(|e| QaError::Config(format!("Invalid Ollama URL: {}", e)))?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    /// Test connection to the Ollama server and verify model availability
    #[inline]
    pub fn health_check(&self) -> AnyResult<()> {
        debug!("Performing health check for Ollama at {}", self.base_url);

        let models = self.list_models().context("Server ping failed")?;

        if !models.iter().any(|m| model_matches(&m.name, &self.model)) {
            let available_models: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
            warn!(
                "Model {} not found. Available models: {:?}",
                self.model, available_models
            );
            anyhow::bail!(
                "Model '{}' is not available. Available models: {:?}",
                self.model,
                available_models
            );
        }

        info!(
            "Health check passed for Ollama server at {} with model {}",
            self.base_url, self.model
        );
        Ok(())
    }

    /// List all models pulled into the local runtime
    #[inline]
    pub fn list_models(&self) -> AnyResult<Vec<ModelInfo>> {
        let url = self
            .base_url
            .join("api/tags")
            .context("Failed to build models URL")?;

        let response_text = get_text(&self.agent, &url).context("Failed to fetch models")?;
        let models_response: ModelsResponse =
            serde_json::from_str(&response_text).context("Failed to parse models response")?;

        debug!("Found {} models", models_response.models.len());
        Ok(models_response.models)
    }

    fn embed_single_batch(&self, texts: &[String]) -> AnyResult<Vec<Vec<f32>>> {
        let url = self
            .base_url
            .join("api/embed")
            .context("Failed to build embedding URL")?;

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response: EmbedResponse = post_json(&self.agent, &url, None, &request)
            .context("Failed to generate embeddings")?;

        Ok(response.embeddings)
    }
}

impl EmbeddingProvider for OllamaEmbeddings {
    #[inline]
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity {
            backend: ProviderBackend::Ollama,
            model: self.model.clone(),
        }
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        vectors
            .pop()
            .ok_or_else(|| QaError::EmbeddingProvider("Ollama returned no embedding".to_string()))
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut results = Vec::with_capacity(texts.len());

        // Process in batches to avoid overwhelming the server
        for chunk in texts.chunks(self.batch_size as usize) {
            let batch = self
                .embed_single_batch(chunk)
                .map_err(|e| QaError::EmbeddingProvider(format!("{:#}", e)))?;
            check_batch(chunk.len(), &batch)?;
            results.extend(batch);
        }

        debug!("Generated {} embeddings total", results.len());
        Ok(results)
    }
}

/// Ollama lists models with an explicit tag, so `llama3.2` matches `llama3.2:latest`
fn model_matches(listed: &str, configured: &str) -> bool {
    listed == configured
        || (!configured.contains(':') && listed.strip_suffix(":latest") == Some(configured))
}
