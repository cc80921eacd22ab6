// Indexer module
// Turns an uploaded PDF into a persisted vector index


use chrono::Utc;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Result;
use crate::database::{IndexManifest, PageMetadata, PageRecord, VectorStore};
use crate::document::{PageUnit, load_pages};
use crate::embeddings::{EmbeddingProvider, check_batch};

/// A freshly built index, still holding its open store
#[derive(Debug)]
pub struct IndexHandle {
    pub page_count: usize,
    pub dimension: usize,
    pub store: VectorStore,
}

impl IndexHandle {
    #[inline]
    pub fn directory(&self) -> &Path {
        self.store.directory()
    }

    /// Drop the pages table and close the store. The directory is left on disk.
    #[inline]
    pub async fn release(self) -> Result<()> {
        debug!("Releasing index handle for {}", self.directory().display());
        self.store.release().await
    }
}

/// Build a persisted index of `document_path` in `persist_directory`.
///
/// Nothing is written until every page has been embedded, so a failed
/// embedding call leaves the directory untouched.
///
/// # Arguments
/// * `document_path` - PDF to index
/// * `persist_directory` - Directory receiving the LanceDB table and manifest
/// * `source_name` - Name recorded as the source of every page
/// * `embedder` - Provider used to embed page text
#[inline]
pub async fn build_index(
    document_path: &Path,
    persist_directory: &Path,
    source_name: &str,
    embedder: &dyn EmbeddingProvider,
) -> Result<IndexHandle> {
    let pages = load_pages(document_path, source_name)?;

    let texts: Vec<String> = pages.iter().map(|page| page.text.clone()).collect();
    info!(
        "Embedding {} pages of {} with {}",
        texts.len(),
        source_name,
        embedder.identity()
    );
    let vectors = embedder.embed_batch(&texts)?;
    check_batch(pages.len(), &vectors)?;

    // load_pages never returns an empty list, so the first vector exists
    let dimension = vectors.first().map_or(0, Vec::len);

    let store = VectorStore::create(persist_directory, dimension).await?;
    let records = page_records(&pages, vectors);
    let page_count = records.len();
    store.store_pages(records).await?;

    IndexManifest {
        dimension,
        source: source_name.to_string(),
        page_count,
        created_at: Utc::now(),
        embedding: embedder.identity(),
    }
    .write(persist_directory)?;

    info!(
        "Indexed {} pages ({} dimensions) into {}",
        page_count,
        dimension,
        persist_directory.display()
    );

    Ok(IndexHandle {
        page_count,
        dimension,
        store,
    })
}

fn page_records(pages: &[PageUnit], vectors: Vec<Vec<f32>>) -> Vec<PageRecord> {
    let created_at = Utc::now().to_rfc3339();
    pages
        .iter()
        .zip(vectors)
        .map(|(page, vector)| PageRecord {
            id: Uuid::new_v4().to_string(),
            vector,
            metadata: PageMetadata {
                page_id: page.page_id(),
                source: page.source.clone(),
                page: page.page,
                content: page.text.clone(),
                created_at: created_at.clone(),
            },
        })
        .collect()
}
