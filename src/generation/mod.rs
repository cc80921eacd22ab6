// Generation module
// {context, question} -> answer providers and the prompt they share

pub mod ollama;
pub mod openai;


use std::sync::Arc;

use crate::config::{GenerationConfig, ProviderBackend};
use crate::embeddings::ProviderIdentity;
use crate::http::ApiKey;
use crate::{QaError, Result};

pub use ollama::OllamaGenerator;
pub use openai::OpenAiGenerator;

/// Instructions placed ahead of the retrieved context
pub const SYSTEM_INSTRUCTIONS: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Produces an answer from retrieved context and a question
pub trait GenerationProvider: Send + Sync {
    fn identity(&self) -> ProviderIdentity;

    fn generate(&self, context: &str, question: &str) -> Result<String>;
}

/// Single-string prompt for completion-style APIs
#[inline]
pub fn render_prompt(context: &str, question: &str) -> String {
    format!(
        "{}\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        SYSTEM_INSTRUCTIONS,
        context.trim(),
        question.trim()
    )
}

/// System message for chat-style APIs; the question goes in the user turn
#[inline]
pub fn render_system_message(context: &str) -> String {
    format!("{}\n----------------\n{}", SYSTEM_INSTRUCTIONS, context.trim())
}

/// Build the provider selected by `config.backend`
#[inline]
pub fn build_generation_provider(
    config: &GenerationConfig,
) -> Result<Arc<dyn GenerationProvider>> {
    match config.backend {
        ProviderBackend::Ollama => Ok(Arc::new(OllamaGenerator::new(config)?)),
        ProviderBackend::OpenAi => {
            let api_key = ApiKey::from_env(&config.api_key_env).map_err(|e| {
                QaError::Config(format!("Hosted generation needs an API key: {}", e))
            })?;
            Ok(Arc::new(OpenAiGenerator::new(config, api_key)?))
        }
    }
}
