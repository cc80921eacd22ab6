// Embeddings module
// Text -> vector providers: a local Ollama runtime or a hosted OpenAI-compatible API

pub mod ollama;
pub mod openai;


use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::config::{EmbeddingConfig, ProviderBackend};
use crate::http::ApiKey;
use crate::{QaError, Result};

pub use ollama::OllamaEmbeddings;
pub use openai::OpenAiEmbeddings;

/// Which backend and model produced a set of vectors.
///
/// Persisted next to an index so a reopened index can be checked against the active provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderIdentity {
    pub backend: ProviderBackend,
    pub model: String,
}

impl fmt::Display for ProviderIdentity {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.backend, self.model)
    }
}

/// Computes embedding vectors for text
pub trait EmbeddingProvider: Send + Sync {
    fn identity(&self) -> ProviderIdentity;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, returning one vector per input in input order
    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Build the provider selected by `config.backend`
#[inline]
pub fn build_embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.backend {
        ProviderBackend::Ollama => Ok(Arc::new(OllamaEmbeddings::new(config)?)),
        ProviderBackend::OpenAi => {
            let api_key = ApiKey::from_env(&config.api_key_env)
                .map_err(|e| QaError::Config(format!("Hosted embeddings need an API key: {}", e)))?;
            Ok(Arc::new(OpenAiEmbeddings::new(config, api_key)?))
        }
    }
}

/// Check that a batch response lines up with its request and has a single, non-zero dimension
pub(crate) fn check_batch(expected: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected {
        return Err(QaError::EmbeddingProvider(format!(
            "Mismatch between request and response counts: {} vs {}",
            expected,
            vectors.len()
        )));
    }

    let Some(first) = vectors.first() else {
        return Ok(());
    };

    if first.is_empty() {
        return Err(QaError::EmbeddingProvider(
            "Provider returned an empty embedding".to_string(),
        ));
    }

    if let Some(bad) = vectors.iter().find(|v| v.len() != first.len()) {
        return Err(QaError::EmbeddingProvider(format!(
            "Inconsistent embedding dimensions: {} vs {}",
            first.len(),
            bad.len()
        )));
    }

    Ok(())
}
