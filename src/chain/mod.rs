// Chain module
// Retrieval-augmented answering over a persisted index


use itertools::Itertools;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::database::{IndexManifest, SearchResult, VectorStore};
use crate::embeddings::EmbeddingProvider;
use crate::generation::GenerationProvider;
use crate::{QaError, Result};

/// Number of pages retrieved for each question
pub const RETRIEVAL_TOP_K: usize = 4;

const CONTEXT_SEPARATOR: &str = "\n\n";

/// A retrieved page that contributed to an answer
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub page_id: String,
    pub source: String,
    pub page: u32,
    /// Cosine similarity to the question, higher is closer
    pub score: f32,
}

impl From<SearchResult> for SourceRef {
    #[inline]
    fn from(result: SearchResult) -> Self {
        Self {
            page_id: result.metadata.page_id,
            source: result.metadata.source,
            page: result.metadata.page,
            score: result.similarity_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub answer: String,
    /// Retrieved pages in retrieval order
    pub sources: Vec<SourceRef>,
}

impl Answer {
    /// Whether any page was retrieved for the question
    #[inline]
    pub fn has_context(&self) -> bool {
        !self.sources.is_empty()
    }
}

/// Retriever over one index composed with a generator
pub struct AnsweringChain {
    store: VectorStore,
    top_k: usize,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
}

impl std::fmt::Debug for AnsweringChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnsweringChain")
            .field("store", &self.store)
            .field("top_k", &self.top_k)
            .field("embedder", &self.embedder.identity())
            .field("generator", &self.generator.identity())
            .finish()
    }
}

/// Open the index in `persist_directory` and compose it with the given providers
///
/// # Errors
/// `IndexUnavailable` when the directory is missing, its manifest cannot be
/// parsed, or LanceDB cannot open it.
#[inline]
pub async fn build_chain(
    persist_directory: &Path,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
) -> Result<AnsweringChain> {
    let store = VectorStore::open(persist_directory).await?;

    if let Some(manifest) = IndexManifest::read(persist_directory)? {
        manifest.check_provider(&embedder.identity());
        debug!(
            "Opened index of {} ({} pages) built at {}",
            manifest.source, manifest.page_count, manifest.created_at
        );
    }

    info!(
        "Answering chain ready: {} for retrieval, {} for generation",
        embedder.identity(),
        generator.identity()
    );

    Ok(AnsweringChain {
        store,
        top_k: RETRIEVAL_TOP_K,
        embedder,
        generator,
    })
}

impl AnsweringChain {
    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer `question` from the pages most similar to it
    #[inline]
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let query_vector = self.embedder.embed(question)?;
        let results = self.store.search_similar(&query_vector, self.top_k).await?;

        if results.is_empty() {
            warn!("{}; answering without context", QaError::NoRelevantContext);
        } else {
            debug!(
                "Retrieved pages {} for question",
                results.iter().map(|r| r.metadata.page).join(", ")
            );
        }

        let context = results
            .iter()
            .map(|r| r.metadata.content.as_str())
            .join(CONTEXT_SEPARATOR);

        let answer = self.generator.generate(&context, question)?;

        Ok(Answer {
            answer,
            sources: results.into_iter().map(SourceRef::from).collect(),
        })
    }
}
