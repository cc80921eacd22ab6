// Session module
// Drives one user's upload → process → ask cycle over a single active index


use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chain::{Answer, AnsweringChain, build_chain};
use crate::config::Config;
use crate::embeddings::{EmbeddingProvider, build_embedding_provider};
use crate::generation::{GenerationProvider, build_generation_provider};
use crate::indexer::{IndexHandle, build_index};
use crate::{QaError, Result};

/// Where the session is in its lifecycle, derived from what the controller holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing uploaded
    Empty,
    /// A document is uploaded but not indexed
    Uploaded,
    /// An index is active, no question asked yet
    Indexed,
    /// An answering chain is built over the active index
    Answering,
}

impl fmt::Display for SessionState {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Empty => "empty",
            Self::Uploaded => "uploaded",
            Self::Indexed => "indexed",
            Self::Answering => "answering",
        };
        f.write_str(label)
    }
}

/// Failures swallowed while tearing down session resources
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub failures: Vec<String>,
}

impl CleanupReport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, failure: String) {
        warn!("Cleanup step failed: {}", failure);
        self.failures.push(failure);
    }
}

/// Fixed on-disk locations used by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub working_dir: PathBuf,
    pub upload_path: PathBuf,
    pub index_dir: PathBuf,
}

impl From<&Config> for SessionPaths {
    #[inline]
    fn from(config: &Config) -> Self {
        Self {
            working_dir: config.get_base_dir().to_path_buf(),
            upload_path: config.upload_path(),
            index_dir: config.index_dir(),
        }
    }
}

/// Holds at most one upload, one index and one answering chain
pub struct SessionController {
    paths: SessionPaths,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    upload_name: Option<String>,
    index: Option<IndexHandle>,
    chain: Option<AnsweringChain>,
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("paths", &self.paths)
            .field("state", &self.state())
            .field("upload_name", &self.upload_name)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    #[inline]
    pub fn new(
        paths: SessionPaths,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Self {
        Self {
            paths,
            embedder,
            generator,
            upload_name: None,
            index: None,
            chain: None,
        }
    }

    /// Build both providers from `config` and root the session in its working directory
    #[inline]
    pub fn from_config(config: &Config) -> Result<Self> {
        let embedder = build_embedding_provider(&config.embedding)?;
        let generator = build_generation_provider(&config.generation)?;
        Ok(Self::new(SessionPaths::from(config), embedder, generator))
    }

    /// Create the working directory and discard anything a previous run left behind
    #[inline]
    pub async fn open(&mut self) -> Result<CleanupReport> {
        std::fs::create_dir_all(&self.paths.working_dir).map_err(|e| {
            QaError::Session(format!(
                "Failed to create working directory {}: {}",
                self.paths.working_dir.display(),
                e
            ))
        })?;
        info!("Session opened in {}", self.paths.working_dir.display());
        Ok(self.clear().await)
    }

    /// End the session, releasing everything it holds
    #[inline]
    pub async fn close(mut self) -> CleanupReport {
        let report = self.clear().await;
        info!("Session closed");
        report
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        match (&self.upload_name, &self.index, &self.chain) {
            (_, Some(_), Some(_)) => SessionState::Answering,
            (_, Some(_), None) => SessionState::Indexed,
            (Some(_), None, _) => SessionState::Uploaded,
            (None, None, _) => SessionState::Empty,
        }
    }

    #[inline]
    pub fn paths(&self) -> &SessionPaths {
        &self.paths
    }

    /// Original file name of the current upload
    #[inline]
    pub fn upload_name(&self) -> Option<&str> {
        self.upload_name.as_deref()
    }

    /// Number of pages in the active index
    #[inline]
    pub fn indexed_pages(&self) -> Option<usize> {
        self.index.as_ref().map(|handle| handle.page_count)
    }

    /// Store `bytes` as the current upload, replacing any previous one.
    ///
    /// An active index stays in place until the next `process`.
    #[inline]
    pub fn upload(&mut self, file_name: &str, bytes: &[u8]) -> Result<()> {
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(QaError::Session(
                "Uploaded file needs a name".to_string(),
            ));
        }

        if let Some(parent) = self.paths.upload_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.paths.upload_path, bytes)?;
        self.upload_name = Some(file_name.to_string());

        info!(
            "Uploaded {} ({} bytes) to {}",
            file_name,
            bytes.len(),
            self.paths.upload_path.display()
        );
        Ok(())
    }

    /// Index the current upload, replacing any active index.
    ///
    /// Returns the number of indexed pages. On failure no index remains and the
    /// upload is kept.
    #[inline]
    pub async fn process(&mut self) -> Result<usize> {
        let Some(source) = self.upload_name.clone() else {
            return Err(QaError::Session(
                "Upload a PDF before processing".to_string(),
            ));
        };

        let report = self.clear_index().await;
        if !report.is_clean() {
            debug!("Continuing after {} cleanup failures", report.failures.len());
        }

        match build_index(
            &self.paths.upload_path,
            &self.paths.index_dir,
            &source,
            self.embedder.as_ref(),
        )
        .await
        {
            Ok(handle) => {
                let pages = handle.page_count;
                self.index = Some(handle);
                Ok(pages)
            }
            Err(e) => {
                let mut report = CleanupReport::default();
                remove_index_dir(&self.paths.index_dir, &mut report);
                Err(e)
            }
        }
    }

    /// Answer a question against the active index, building the chain on first use
    #[inline]
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let Some(index) = &self.index else {
            return Err(QaError::IndexUnavailable(
                "No document has been processed".to_string(),
            ));
        };

        let question = question.trim();
        if question.is_empty() {
            return Err(QaError::Session("Question is empty".to_string()));
        }

        let chain = match self.chain.take() {
            Some(chain) => chain,
            None => {
                build_chain(
                    index.directory(),
                    Arc::clone(&self.embedder),
                    Arc::clone(&self.generator),
                )
                .await?
            }
        };

        let answer = chain.ask(question).await;
        self.chain = Some(chain);
        answer
    }

    /// Drop the chain and index, delete the index directory and the upload.
    ///
    /// Never fails; anything that could not be cleaned up is listed in the report.
    #[inline]
    pub async fn clear(&mut self) -> CleanupReport {
        let mut report = self.clear_index().await;

        self.upload_name = None;
        let upload = &self.paths.upload_path;
        if upload.exists() {
            if let Err(e) = std::fs::remove_file(upload) {
                report.record(format!("remove upload {}: {}", upload.display(), e));
            }
        }

        if report.is_clean() {
            debug!("Session cleared");
        }
        report
    }

    async fn clear_index(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        self.chain = None;
        if let Some(handle) = self.index.take() {
            if let Err(e) = handle.release().await {
                report.record(format!("release index: {}", e));
            }
        }

        remove_index_dir(&self.paths.index_dir, &mut report);
        report
    }
}

fn remove_index_dir(index_dir: &Path, report: &mut CleanupReport) {
    if !index_dir.exists() {
        return;
    }
    match std::fs::remove_dir_all(index_dir) {
        Ok(()) => debug!("Removed index directory {}", index_dir.display()),
        Err(e) => report.record(format!(
            "remove index directory {}: {}",
            index_dir.display(),
            e
        )),
    }
}
