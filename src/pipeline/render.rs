//! Page image renderer for multimodal consumers.
//!
//! Renderer calls are advisory: a caller asks for a picture of a page whose
//! extracted text looks sparse (handwriting, diagrams). An out-of-range index
//! or a rendering failure yields `None`, never an error.
//!
//! ## Why cap pixels, not DPI?
//!
//! Page sizes vary wildly: an A0 poster at 150 DPI would produce a
//! 7,000 × 9,900 px image. The arena's `max_rendered_pixels` caps the longest
//! edge regardless of physical size, keeping memory bounded.

use super::encode;
use crate::document::PageArena;
use tracing::{debug, warn};

/// DPI used for images handed to the language-model collaborator.
pub const DEFAULT_IMAGE_DPI: u32 = 150;

/// DPI used internally when feeding the OCR capability.
pub const DEFAULT_OCR_DPI: u32 = 300;

/// Resolve a caller-supplied index against the arena, rejecting negatives
/// and anything at or past `page_count`.
pub fn checked_index(doc: &dyn PageArena, page_index: i64) -> Option<usize> {
    usize::try_from(page_index)
        .ok()
        .filter(|&i| i < doc.page_count())
}

/// Render page `page_index` as JPEG bytes.
pub fn render_page_jpeg(
    doc: &dyn PageArena,
    page_index: i64,
    dpi: u32,
    quality: u8,
) -> Option<Vec<u8>> {
    let Some(index) = checked_index(doc, page_index) else {
        debug!(
            "Page index {} out of range (document has {} pages)",
            page_index,
            doc.page_count()
        );
        return None;
    };

    let image = match doc.render_page(index, dpi) {
        Ok(image) => image,
        Err(e) => {
            warn!("{}", e);
            return None;
        }
    };

    match encode::encode_jpeg(&image, quality) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("Page {}: JPEG encoding failed: {}", index + 1, e);
            None
        }
    }
}

/// Render page `page_index` as a base64-encoded JPEG.
pub fn render_page_base64(
    doc: &dyn PageArena,
    page_index: i64,
    dpi: u32,
    quality: u8,
) -> Option<String> {
    render_page_jpeg(doc, page_index, dpi, quality).map(|bytes| encode::to_base64(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::memory::MemoryDocument;

    fn doc() -> MemoryDocument {
        MemoryDocument::from_pages(["one", "two", "three"]).with_page_size(72.0, 72.0)
    }

    #[test]
    fn negative_index_is_none() {
        assert!(render_page_jpeg(&doc(), -1, DEFAULT_IMAGE_DPI, 85).is_none());
        assert!(render_page_base64(&doc(), i64::MIN, DEFAULT_IMAGE_DPI, 85).is_none());
    }

    #[test]
    fn one_past_last_is_none() {
        let d = doc();
        assert!(render_page_jpeg(&d, d.page_count() as i64, DEFAULT_IMAGE_DPI, 85).is_none());
    }

    #[test]
    fn valid_index_renders() {
        let d = doc();
        let jpeg = render_page_jpeg(&d, 2, DEFAULT_IMAGE_DPI, 85).expect("rendered");
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        assert!(render_page_base64(&d, 0, DEFAULT_IMAGE_DPI, 85).is_some());
    }

    #[test]
    fn render_failure_is_none() {
        let d = doc().fail_render_at(1);
        assert!(render_page_jpeg(&d, 1, DEFAULT_IMAGE_DPI, 85).is_none());
    }
}
