use thiserror::Error;

pub type Result<T> = std::result::Result<T, QaError>;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Document unreadable: {0}")]
    DocumentUnreadable(String),

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Generation provider error: {0}")]
    GenerationProvider(String),

    #[error("No relevant context was retrieved for the question")]
    NoRelevantContext,

    #[error("Session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chain;
pub mod commands;
pub mod config;
pub mod database;
pub mod document;
pub mod embeddings;
pub mod generation;
pub mod http;
pub mod indexer;
pub mod session;

#[cfg(test)]
mod test_support;
