// Index manifest
// Records which embedding provider and document produced an index directory


use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::embeddings::ProviderIdentity;
use crate::{QaError, Result};

pub const MANIFEST_FILE_NAME: &str = "index.toml";

/// Description of an index, written alongside its pages table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub dimension: usize,
    pub source: String,
    pub page_count: usize,
    pub created_at: DateTime<Utc>,
    pub embedding: ProviderIdentity,
}

impl IndexManifest {
    #[inline]
    pub fn write(&self, directory: &Path) -> Result<()> {
        let path = directory.join(MANIFEST_FILE_NAME);
        let content = toml::to_string_pretty(self)
            .map_err(|e| QaError::Storage(format!("Failed to serialize index manifest: {}", e)))?;
        fs::write(&path, content).map_err(|e| {
            QaError::Storage(format!("Failed to write {}: {}", path.display(), e))
        })?;
        debug!("Wrote index manifest to {}", path.display());
        Ok(())
    }

    /// Read the manifest in `directory`, if one was written
    #[inline]
    pub fn read(directory: &Path) -> Result<Option<Self>> {
        let path = directory.join(MANIFEST_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path).map_err(|e| {
            QaError::IndexUnavailable(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let manifest = toml::from_str(&content).map_err(|e| {
            QaError::IndexUnavailable(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(Some(manifest))
    }

    /// Warn when the active embedding provider differs from the one that built the index.
    /// Returns whether they match.
    #[inline]
    pub fn check_provider(&self, active: &ProviderIdentity) -> bool {
        if self.embedding == *active {
            return true;
        }
        warn!(
            "Index was built with {} but the active embedding provider is {}; answers may be poor until the document is processed again",
            self.embedding, active
        );
        false
    }
}
