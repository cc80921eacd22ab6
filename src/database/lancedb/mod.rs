// LanceDB vector database module
// Stores page embeddings and answers nearest-neighbour queries


pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use vector_store::{SearchResult, VectorStore};

/// Embedding record stored in LanceDB
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// Unique identifier for this embedding
    pub id: String,
    /// The vector embedding of the page text
    pub vector: Vec<f32>,
    /// Metadata about the page this embedding represents
    pub metadata: PageMetadata,
}

/// Metadata for a page stored alongside its embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    /// `<source>#page=<n>`
    pub page_id: String,
    /// Name of the uploaded document
    pub source: String,
    /// 1-based page number
    pub page: u32,
    /// Extracted page text
    pub content: String,
    /// Timestamp when this embedding was created
    pub created_at: String,
}
