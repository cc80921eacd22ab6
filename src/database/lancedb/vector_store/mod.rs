
use super::{PageMetadata, PageRecord};
use crate::{QaError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const PAGES_TABLE: &str = "pages";

/// Vector database store using LanceDB for similarity search over pages
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    directory: PathBuf,
    vector_dimension: Option<usize>,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub metadata: PageMetadata,
    pub similarity_score: f32,
    pub distance: f32,
}

impl std::fmt::Debug for VectorStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("directory", &self.directory)
            .field("table_name", &self.table_name)
            .field("vector_dimension", &self.vector_dimension)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Create a fresh store in `directory`, replacing any pages already there
    ///
    /// # Arguments
    /// * `directory` - Index directory, created if absent
    /// * `vector_dim` - Dimension of every vector that will be stored
    #[inline]
    pub async fn create(directory: &Path, vector_dim: usize) -> Result<Self> {
        if vector_dim == 0 {
            return Err(QaError::Storage(
                "Cannot create an index with zero-dimensional vectors".to_string(),
            ));
        }

        std::fs::create_dir_all(directory).map_err(|e| {
            QaError::Storage(format!(
                "Failed to create index directory {}: {}",
                directory.display(),
                e
            ))
        })?;

        let connection = Self::connect(directory)
            .await
            .map_err(|e| QaError::Storage(format!("Failed to connect to LanceDB: {}", e)))?;

        let mut store = Self {
            connection,
            table_name: PAGES_TABLE.to_string(),
            directory: directory.to_path_buf(),
            vector_dimension: None,
        };

        store.drop_table_if_exists().await?;
        store
            .connection
            .create_empty_table(&store.table_name, create_schema(dimension_as_i32(vector_dim)?))
            .execute()
            .await
            .map_err(|e| QaError::Storage(format!("Failed to create table: {}", e)))?;
        store.vector_dimension = Some(vector_dim);

        info!(
            "Created pages table with {} dimensions at {}",
            vector_dim,
            directory.display()
        );
        Ok(store)
    }

    /// Open a store previously written to `directory`
    ///
    /// A directory without a pages table opens as an empty store.
    #[inline]
    pub async fn open(directory: &Path) -> Result<Self> {
        if !directory.is_dir() {
            return Err(QaError::IndexUnavailable(format!(
                "No index found at {}",
                directory.display()
            )));
        }

        let connection = Self::connect(directory).await.map_err(|e| {
            QaError::IndexUnavailable(format!(
                "Failed to open index at {}: {}",
                directory.display(),
                e
            ))
        })?;

        let mut store = Self {
            connection,
            table_name: PAGES_TABLE.to_string(),
            directory: directory.to_path_buf(),
            vector_dimension: None,
        };

        if store.has_table().await? {
            let dim = store.detect_existing_vector_dimension().await?;
            debug!("Detected existing vector dimension: {}", dim);
            store.vector_dimension = Some(dim);
        } else {
            warn!(
                "Index directory {} has no pages table, treating it as empty",
                directory.display()
            );
        }

        Ok(store)
    }

    async fn connect(directory: &Path) -> lancedb::Result<Connection> {
        let uri = format!("file://{}", directory.display());
        debug!("Connecting to LanceDB at {}", uri);
        lancedb::connect(&uri).execute().await
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[inline]
    pub fn vector_dimension(&self) -> Option<usize> {
        self.vector_dimension
    }

    #[inline]
    pub async fn has_table(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| QaError::IndexUnavailable(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    /// Detect vector dimension from existing table schema
    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| QaError::IndexUnavailable(format!("Failed to open pages table: {}", e)))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| QaError::IndexUnavailable(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                QaError::IndexUnavailable(
                    "Could not find vector column or determine dimension".to_string(),
                )
            })
    }

    /// Store page embeddings in a single batch
    ///
    /// # Arguments
    /// * `records` - Page records; every vector must match the table dimension
    #[inline]
    pub async fn store_pages(&self, records: Vec<PageRecord>) -> Result<()> {
        if records.is_empty() {
            debug!("No embeddings to store");
            return Ok(());
        }

        let record_batch = self.create_record_batch(&records)?;

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| QaError::Storage(format!("Failed to open table: {}", e)))?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| QaError::Storage(format!("Failed to insert embeddings: {}", e)))?;

        info!("Stored {} page embeddings", records.len());
        Ok(())
    }

    /// Create a RecordBatch from page records
    fn create_record_batch(&self, records: &[PageRecord]) -> Result<RecordBatch> {
        let len = records.len();
        let vector_dim = self
            .vector_dimension
            .ok_or_else(|| QaError::Storage("Pages table has not been created".to_string()))?;

        if let Some(record) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(QaError::Storage(format!(
                "Vector for {} has {} dimensions, expected {}",
                record.metadata.page_id,
                record.vector.len(),
                vector_dim
            )));
        }

        let mut flat_values = Vec::with_capacity(len * vector_dim);
        for record in records {
            flat_values.extend_from_slice(&record.vector);
        }

        let list_size = dimension_as_i32(vector_dim)?;
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            field,
            list_size,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| QaError::Storage(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from_iter_values(records.iter().map(|r| r.id.as_str()))),
            Arc::new(vector_array),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.page_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.source.as_str()),
            )),
            Arc::new(UInt32Array::from_iter_values(
                records.iter().map(|r| r.metadata.page),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.content.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                records.iter().map(|r| r.metadata.created_at.as_str()),
            )),
        ];

        RecordBatch::try_new(create_schema(list_size), arrays)
            .map_err(|e| QaError::Storage(format!("Failed to create record batch: {}", e)))
    }

    /// Search for the pages closest to `query_vector` by cosine distance
    ///
    /// # Arguments
    /// * `query_vector` - Embedding of the question
    /// * `limit` - Maximum number of results to return
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        let Some(vector_dim) = self.vector_dimension else {
            debug!("Search against an index without a pages table");
            return Ok(Vec::new());
        };

        if query_vector.len() != vector_dim {
            return Err(QaError::Storage(format!(
                "Query vector has {} dimensions but the index stores {}",
                query_vector.len(),
                vector_dim
            )));
        }

        if self.count_pages().await? == 0 {
            return Ok(Vec::new());
        }

        debug!("Searching for similar vectors with limit: {}", limit);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| QaError::Storage(format!("Failed to open table: {}", e)))?;

        let results = table
            .vector_search(query_vector)
            .map_err(|e| QaError::Storage(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit)
            .execute()
            .await
            .map_err(|e| QaError::Storage(format!("Failed to execute search: {}", e)))?;

        let mut search_results = parse_search_results_stream(results).await?;
        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        search_results.truncate(limit);
        Ok(search_results)
    }

    /// Get the total number of pages stored
    #[inline]
    pub async fn count_pages(&self) -> Result<u64> {
        if !self.has_table().await? {
            return Ok(0);
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| QaError::Storage(format!("Failed to open table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| QaError::Storage(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Drop the pages table and close the connection.
    ///
    /// Leaves the directory itself in place; removing it is the caller's job.
    #[inline]
    pub async fn release(self) -> Result<()> {
        info!("Releasing vector store at {}", self.directory.display());
        self.drop_table_if_exists().await?;
        drop(self.connection);
        Ok(())
    }

    /// Drop the pages table if it exists
    async fn drop_table_if_exists(&self) -> Result<()> {
        if self.has_table().await? {
            info!("Dropping existing pages table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| QaError::Storage(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }
}

/// Schema of the pages table for vectors of `list_size` floats
fn create_schema(list_size: i32) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                list_size,
            ),
            false,
        ),
        Field::new("page_id", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("page", DataType::UInt32, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn dimension_as_i32(vector_dim: usize) -> Result<i32> {
    i32::try_from(vector_dim)
        .map_err(|_| QaError::Storage(format!("Vector dimension {} is too large", vector_dim)))
}

/// Parse search results from LanceDB stream into SearchResult structs
async fn parse_search_results_stream(
    mut results: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<SearchResult>> {
    let mut search_results = Vec::new();

    while let Some(batch) = results
        .try_next()
        .await
        .map_err(|e| QaError::Storage(format!("Failed to read result stream: {}", e)))?
    {
        search_results.extend(parse_search_batch(&batch)?);
    }

    debug!("Parsed {} search results from stream", search_results.len());
    Ok(search_results)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| QaError::Storage(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| QaError::Storage(format!("Invalid {} column type", name)))
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let page_ids = string_column(batch, "page_id")?;
    let sources = string_column(batch, "source")?;
    let contents = string_column(batch, "content")?;
    let created_ats = string_column(batch, "created_at")?;

    let pages = batch
        .column_by_name("page")
        .ok_or_else(|| QaError::Storage("Missing page column".to_string()))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| QaError::Storage("Invalid page column type".to_string()))?;

    // Extract distance scores if available
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let results = (0..batch.num_rows())
        .map(|row| {
            let distance =
                distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            SearchResult {
                metadata: PageMetadata {
                    page_id: page_ids.value(row).to_string(),
                    source: sources.value(row).to_string(),
                    page: pages.value(row),
                    content: contents.value(row).to_string(),
                    created_at: created_ats.value(row).to_string(),
                },
                // Cosine distance lies in [0, 2]
                similarity_score: 1.0 - distance,
                distance,
            }
        })
        .collect();

    Ok(results)
}
