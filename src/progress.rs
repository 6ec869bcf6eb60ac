//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the document.
//!
//! # Why callbacks instead of channels?
//!
//! Callers can forward events to a channel, a WebSocket or a terminal
//! progress bar without the library knowing how the host application
//! communicates. Extraction runs on a blocking worker thread, so the trait is
//! `Send + Sync`.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docextract::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct OcrCounter {
//!     attempts: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for OcrCounter {
//!     fn on_ocr_attempted(&self, page_num: usize, total_pages: usize) {
//!         self.attempts.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("OCR on page {}/{}", page_num, total_pages);
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(OcrCounter { attempts: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the extraction pipeline as it processes a document.
///
/// Page numbers are 1-indexed. All methods have default no-op
/// implementations so callers only override what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after the document is opened, before any page is read.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after a page's text layer has been read and cleaned.
    ///
    /// `char_count` is the number of non-whitespace characters recovered.
    fn on_page_extracted(&self, page_num: usize, total_pages: usize, char_count: usize) {
        let _ = (page_num, total_pages, char_count);
    }

    /// Called when a page falls below the OCR threshold, before recognition.
    fn on_ocr_attempted(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when OCR for a page finishes. `recovered` is true when the page
    /// now carries a recovered text layer.
    fn on_ocr_result(&self, page_num: usize, total_pages: usize, recovered: bool) {
        let _ = (page_num, total_pages, recovered);
    }

    /// Called once when the result has been assembled.
    fn on_extraction_complete(&self, total_pages: usize, ocr_recovered: usize) {
        let _ = (total_pages, ocr_recovered);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
