//! Output types returned by the extraction entry points.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Marker every Markdown page begins with. Downstream consumers split on it.
pub const PAGE_MARKER_PREFIX: &str = "## Page ";

/// Separator between pages in [`ExtractionResult::raw_text`] and
/// [`ExtractionResult::markdown_content`].
pub const PAGE_SEPARATOR: &str = "\n\n";

/// Per-page output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageContent {
    /// Zero-based page index.
    pub index: usize,
    /// Cleaned plain text; may be empty.
    pub raw_text: String,
    /// `## Page N`-prefixed Markdown.
    pub markdown_text: String,
    /// The page was replaced by one carrying an OCR text layer.
    pub has_ocr_replacement: bool,
    /// Failures absorbed while reading, recognising or replacing this page.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<PageError>,
}

/// Counters for one extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages that fell under the OCR threshold and were sent to the recogniser.
    pub ocr_attempted: usize,
    /// Pages whose text was recovered and spliced back into the document.
    pub ocr_recovered: usize,
    /// Wall-clock time of the whole call.
    pub duration_ms: u64,
}

/// The immutable result of one extraction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Every page's cleaned text joined with `"\n\n"`, in page order.
    pub raw_text: String,
    /// Every page's Markdown joined with `"\n\n"`, in page order.
    pub markdown_content: String,
    pub page_count: usize,
    /// Set when OCR added a text layer to at least one page. The caller owns
    /// this file and should store it in place of the original upload.
    pub replaced_document_path: Option<PathBuf>,
    pub pages: Vec<PageContent>,
    pub stats: ExtractionStats,
}

impl ExtractionResult {
    /// Cleaned text of each page, in order.
    pub fn raw_pages(&self) -> Vec<&str> {
        self.pages.iter().map(|p| p.raw_text.as_str()).collect()
    }

    /// Markdown of each page, in order. Each entry starts with `## Page N`.
    pub fn markdown_pages(&self) -> Vec<&str> {
        self.pages.iter().map(|p| p.markdown_text.as_str()).collect()
    }
}

/// Metadata extracted from the PDF's info dictionary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub modification_date: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// Build the Markdown for page `page_num` (one-based) around `body`.
pub fn page_markdown(page_num: usize, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        format!("{PAGE_MARKER_PREFIX}{page_num}")
    } else {
        format!("{PAGE_MARKER_PREFIX}{page_num}\n\n{body}")
    }
}
