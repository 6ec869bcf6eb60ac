//! In-memory [`PageArena`], for tests and for callers that already hold
//! per-page text.
//!
//! Rendering produces a blank page of the right size; replacement records the
//! new text layer; saving writes the pages as JSON. Individual failures can be
//! injected per page so callers can exercise the absorbed-error paths.

use super::{PageArena, TextLine, TextSpan};
use crate::error::{ExtractError, PageError};
use image::{DynamicImage, GrayImage, Luma};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// US Letter, in points.
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

#[derive(Debug, Clone, Serialize)]
struct MemoryPage {
    text: String,
    #[serde(skip)]
    lines: Option<Vec<TextLine>>,
    replaced: bool,
}

/// A document whose pages live entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    pages: Vec<MemoryPage>,
    page_size: (f32, f32),
    max_rendered_pixels: u32,
    failing_text: HashSet<usize>,
    failing_render: HashSet<usize>,
    failing_replace: HashSet<usize>,
    failing_save: bool,
}

impl MemoryDocument {
    /// One page per string. Positioned lines are derived from the text at a
    /// uniform 11pt, one line per `\n`.
    pub fn from_pages<S: AsRef<str>>(pages: impl IntoIterator<Item = S>) -> Self {
        let pages = pages
            .into_iter()
            .map(|text| MemoryPage {
                text: text.as_ref().to_string(),
                lines: None,
                replaced: false,
            })
            .collect();
        Self::with_pages(pages)
    }

    /// One page per list of styled lines. The raw text is the lines' text
    /// joined with `\n`.
    pub fn from_lines(pages: impl IntoIterator<Item = Vec<TextLine>>) -> Self {
        let pages = pages
            .into_iter()
            .map(|lines| MemoryPage {
                text: lines
                    .iter()
                    .map(TextLine::text)
                    .collect::<Vec<_>>()
                    .join("\n"),
                lines: Some(lines),
                replaced: false,
            })
            .collect();
        Self::with_pages(pages)
    }

    fn with_pages(pages: Vec<MemoryPage>) -> Self {
        Self {
            pages,
            page_size: DEFAULT_PAGE_SIZE,
            max_rendered_pixels: 5000,
            failing_text: HashSet::new(),
            failing_render: HashSet::new(),
            failing_replace: HashSet::new(),
            failing_save: false,
        }
    }

    /// Page size in points, used to size rendered images.
    pub fn with_page_size(mut self, width: f32, height: f32) -> Self {
        self.page_size = (width, height);
        self
    }

    pub fn with_max_rendered_pixels(mut self, px: u32) -> Self {
        self.max_rendered_pixels = px.max(1);
        self
    }

    /// Make [`PageArena::page_text`] and [`PageArena::page_lines`] fail for `index`.
    pub fn fail_text_at(mut self, index: usize) -> Self {
        self.failing_text.insert(index);
        self
    }

    /// Make [`PageArena::render_page`] fail for `index`.
    pub fn fail_render_at(mut self, index: usize) -> Self {
        self.failing_render.insert(index);
        self
    }

    /// Make [`PageArena::replace_page`] fail for `index`.
    pub fn fail_replace_at(mut self, index: usize) -> Self {
        self.failing_replace.insert(index);
        self
    }

    /// Make [`PageArena::save_to`] fail.
    pub fn fail_save(mut self) -> Self {
        self.failing_save = true;
        self
    }

    /// Whether page `index` has been swapped by [`PageArena::replace_page`].
    pub fn is_replaced(&self, index: usize) -> bool {
        self.pages.get(index).is_some_and(|p| p.replaced)
    }

    fn page(&self, index: usize) -> Option<&MemoryPage> {
        self.pages.get(index)
    }
}

impl PageArena for MemoryDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> Result<String, PageError> {
        if self.failing_text.contains(&index) {
            return Err(PageError::TextUnavailable {
                page: index + 1,
                detail: "injected failure".into(),
            });
        }
        self.page(index)
            .map(|p| p.text.clone())
            .ok_or_else(|| out_of_range(index, self.pages.len()))
    }

    fn page_lines(&self, index: usize) -> Result<Vec<TextLine>, PageError> {
        let text = self.page_text(index)?;
        if let Some(lines) = self.page(index).and_then(|p| p.lines.clone()) {
            return Ok(lines);
        }
        Ok(text
            .lines()
            .enumerate()
            .map(|(i, line)| {
                TextLine::new(72.0 + i as f32 * 13.2, vec![TextSpan::plain(line, 11.0)])
            })
            .collect())
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<DynamicImage, PageError> {
        if index >= self.pages.len() || self.failing_render.contains(&index) {
            return Err(PageError::RenderFailed {
                page: index + 1,
                detail: "page cannot be rendered".into(),
            });
        }
        let scale = dpi as f32 / 72.0;
        let cap = self.max_rendered_pixels as f32;
        let (w, h) = (self.page_size.0 * scale, self.page_size.1 * scale);
        let shrink = (cap / w.max(h)).min(1.0);
        let width = ((w * shrink).round() as u32).max(1);
        let height = ((h * shrink).round() as u32).max(1);
        Ok(DynamicImage::ImageLuma8(GrayImage::from_pixel(
            width,
            height,
            Luma([255]),
        )))
    }

    fn replace_page(
        &mut self,
        index: usize,
        _image: &DynamicImage,
        text: &str,
    ) -> Result<(), PageError> {
        if self.failing_replace.contains(&index) {
            return Err(PageError::ReplaceFailed {
                page: index + 1,
                detail: "injected failure".into(),
            });
        }
        let count = self.pages.len();
        let page = self
            .pages
            .get_mut(index)
            .ok_or_else(|| out_of_range(index, count))?;
        *page = MemoryPage {
            text: text.to_string(),
            lines: None,
            replaced: true,
        };
        Ok(())
    }

    fn save_to(&self, path: &Path) -> Result<(), ExtractError> {
        let write_err = |source| ExtractError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        if self.failing_save {
            return Err(write_err(std::io::Error::other("injected failure")));
        }
        let json = serde_json::to_vec_pretty(&self.pages)
            .map_err(|e| ExtractError::Internal(format!("serialise pages: {e}")))?;
        std::fs::write(path, json).map_err(write_err)
    }
}

fn out_of_range(index: usize, count: usize) -> PageError {
    PageError::TextUnavailable {
        page: index + 1,
        detail: format!("page index out of range (document has {count} pages)"),
    }
}
