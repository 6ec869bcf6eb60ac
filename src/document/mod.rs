//! Document access: an index-addressed arena of pages.
//!
//! Everything the extraction pipeline needs from a document goes through
//! [`PageArena`]. Two implementations exist:
//!
//! * [`pdfium::PdfiumDocument`] — a real PDF opened with pdfium.
//! * [`memory::MemoryDocument`] — pages held in memory, for tests and for
//!   callers that already have per-page text.
//!
//! ## Why replace-by-index?
//!
//! OCR fallback swaps pages in place. Splicing with "delete then insert"
//! shifts every later index for a moment, and replacing two pages in one pass
//! becomes order-dependent. [`PageArena::replace_page`] is a single operation
//! whose contract is that the page count and every other index are unchanged
//! once it returns.

pub mod memory;
pub mod pdfium;

use crate::error::{ExtractError, PageError};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A run of text on one line sharing the same style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    /// Font size in points.
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
}

impl TextSpan {
    /// A regular-weight, upright span.
    pub fn plain(text: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font_size,
            bold: false,
            italic: false,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }
}

/// One positioned line of text on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    /// Distance from the top edge of the page to the top of the line, in points.
    pub top: f32,
    pub spans: Vec<TextSpan>,
}

impl TextLine {
    pub fn new(top: f32, spans: Vec<TextSpan>) -> Self {
        Self { top, spans }
    }

    /// Concatenated text of every span.
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Largest font size on the line, or `0.0` for an empty line.
    pub fn font_size(&self) -> f32 {
        self.spans.iter().map(|s| s.font_size).fold(0.0, f32::max)
    }
}

/// Index-addressed access to the pages of one open document.
///
/// Indices are zero-based. An implementation is owned by exactly one
/// extraction call; nothing here is shared between concurrent extractions.
pub trait PageArena {
    /// Number of pages. Never changes across [`replace_page`](Self::replace_page).
    fn page_count(&self) -> usize;

    /// The page's raw text layer, line breaks as the backend reports them.
    fn page_text(&self, index: usize) -> Result<String, PageError>;

    /// Positioned, styled lines in reading order. Used for structured Markdown.
    fn page_lines(&self, index: usize) -> Result<Vec<TextLine>, PageError>;

    /// Rasterise the page at `dpi`, bounded by the implementation's pixel cap.
    fn render_page(&self, index: usize, dpi: u32) -> Result<DynamicImage, PageError>;

    /// Swap page `index` for a page showing `image` full-bleed with `text` as
    /// an invisible, selectable text layer.
    ///
    /// On `Err` the page list is left as it was: same count, same order,
    /// page `index` still the original.
    fn replace_page(
        &mut self,
        index: usize,
        image: &DynamicImage,
        text: &str,
    ) -> Result<(), PageError>;

    /// Persist the document, including any replaced pages, to `path`.
    fn save_to(&self, path: &Path) -> Result<(), ExtractError>;
}
