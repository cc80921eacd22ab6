// Document module
// Loads a PDF into page-level text units


use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::{QaError, Result};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Extracted text of one PDF page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageUnit {
    pub text: String,
    /// 1-based page number within the source document
    pub page: u32,
    /// Name of the document the page came from
    pub source: String,
}

impl PageUnit {
    /// Stable identifier of this page within an index
    #[inline]
    pub fn page_id(&self) -> String {
        format!("{}#page={}", self.source, self.page)
    }
}

/// Read a PDF from disk and split it into one unit per page with extractable text
#[inline]
pub fn load_pages(path: &Path, source: &str) -> Result<Vec<PageUnit>> {
    let bytes = std::fs::read(path).map_err(|e| {
        QaError::DocumentUnreadable(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let pages = pages_from_bytes(&bytes, source)?;
    info!(
        "Loaded {} text pages from {} ({})",
        pages.len(),
        source,
        path.display()
    );
    Ok(pages)
}

/// Split in-memory PDF bytes into page units
#[inline]
pub fn pages_from_bytes(bytes: &[u8], source: &str) -> Result<Vec<PageUnit>> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(QaError::DocumentUnreadable(format!(
            "{} is not a PDF file",
            source
        )));
    }

    let page_texts = pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| {
        QaError::DocumentUnreadable(format!("Failed to parse {}: {}", source, e))
    })?;

    debug!("{} has {} pages", source, page_texts.len());

    let pages: Vec<PageUnit> = page_texts
        .into_iter()
        .zip(1u32..)
        .filter_map(|(text, page)| {
            let text = normalize_page_text(&text);
            (!text.is_empty()).then(|| PageUnit {
                text,
                page,
                source: source.to_string(),
            })
        })
        .collect();

    if pages.is_empty() {
        return Err(QaError::DocumentUnreadable(format!(
            "{} contains no extractable text",
            source
        )));
    }

    Ok(pages)
}

/// Trim each line and collapse runs of blank lines left behind by layout extraction
fn normalize_page_text(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut blank_run = false;

    for line in text.lines().map(str::trim_end) {
        if line.trim().is_empty() {
            blank_run = !normalized.is_empty();
            continue;
        }
        if blank_run {
            normalized.push('\n');
            blank_run = false;
        }
        if !normalized.is_empty() {
            normalized.push('\n');
        }
        normalized.push_str(line.trim_start());
    }

    normalized
}
