// Database module
// LanceDB vector storage for page embeddings, plus the manifest describing an index

pub mod lancedb;
pub mod manifest;

pub use self::lancedb::{PageMetadata, PageRecord, SearchResult, VectorStore};
pub use manifest::{IndexManifest, MANIFEST_FILE_NAME};
