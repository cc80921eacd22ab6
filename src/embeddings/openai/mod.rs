
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{EmbeddingProvider, ProviderIdentity, check_batch};
use crate::config::{EmbeddingConfig, ProviderBackend};
use crate::http::{ApiKey, build_agent, post_json};
use crate::{QaError, Result};

/// Embedding client for a hosted OpenAI-compatible `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddings {
    base_url: Url,
    model: String,
    batch_size: u32,
    api_key: ApiKey,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddings {
    #[inline]
    pub fn new(config: &EmbeddingConfig, api_key: ApiKey) -> Result<Self> {
        let base_url = config
            .endpoint()
            .map_err(|e| QaError::Config(format!("Invalid embeddings API URL: {}", e)))?;

        Ok(Self {
            base_url,
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            api_key,
            agent: build_agent(Duration::from_secs(config.timeout_seconds)),
        })
    }

    fn embed_single_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let url = self
            .base_url
            .join("embeddings")
            .context("Failed to build embeddings URL")?;

        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };

        let response: EmbeddingsResponse = post_json(&self.agent, &url, Some(&self.api_key), &request)
            .context("Failed to generate embeddings")?;

        // The API may reorder items; `index` ties each vector back to its input
        let mut data = response.data;
        data.sort_by_key(|item| item.index);
        if let Some((position, item)) = data
            .iter()
            .enumerate()
            .find(|(position, item)| item.index != *position)
        {
            anyhow::bail!(
                "Embeddings response has index {} at position {} of {} inputs",
                item.index,
                position,
                texts.len()
            );
        }

        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

impl EmbeddingProvider for OpenAiEmbeddings {
    #[inline]
    fn identity(&self) -> ProviderIdentity {
        ProviderIdentity {
            backend: ProviderBackend::OpenAi,
            model: self.model.clone(),
        }
    }

    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()])?;
        vectors.pop().ok_or_else(|| {
            QaError::EmbeddingProvider("Embeddings API returned no vector".to_string())
        })
    }

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size as usize) {
            let batch = self
                .embed_single_batch(chunk)
                .map_err(|e| QaError::EmbeddingProvider(format!("{:#}", e)))?;
            check_batch(chunk.len(), &batch)?;
            results.extend(batch);
        }

        debug!("Generated {} hosted embeddings", results.len());
        Ok(results)
    }
}
