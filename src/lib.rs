//! # edgequake-docextract
//!
//! Deterministic per-page text and Markdown extraction from PDFs, with
//! encoding repair and OCR fallback.
//!
//! ## Why this crate?
//!
//! Text pulled straight out of real-world PDFs is rarely clean. Broken font
//! subsetting maps ligatures to garbage (`introduc3on`, `a=ention`, `U+F001`),
//! scanned pages have no text layer at all, and downstream consumers (language
//! models, highlight-capable viewers) need stable page boundaries. This crate
//! produces two artifacts per page, cleaned plain text and section-aware
//! Markdown, and gives scanned pages a selectable text layer when an OCR
//! engine is available.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     validate path and %PDF signature
//!  ├─ 2. Extract   per-page text layer, whitespace + de-hyphenation flags
//!  ├─ 3. Repair    ligature map → NFKC → ti/tt artefacts → control chars
//!  ├─ 4. OCR       near-empty pages rendered at 300 DPI, recognised, replaced
//!  ├─ 5. Markdown  structured (font sizes) or heuristic (paragraphs)
//!  └─ 6. Output    "## Page N" pages + optional OCR-enhanced PDF path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docextract::{extract_document, ExtractionConfig, ExtractError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     match extract_document("upload.pdf", &config).await {
//!         Ok(result) => println!("{}", result.markdown_content),
//!         Err(e) if e.is_client_error() => eprintln!("{}", e.user_message()),
//!         Err(e) => return Err(e.into()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docextract` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `ocr`   | off     | Neural OCR fallback via `ocrs` / `rten` ([`pipeline::ocr::OcrsRecognizer`]) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docextract = { version = "0.1", default-features = false }
//! ```
//!
//! ## pdfium
//!
//! PDF access goes through a pdfium shared library found at runtime: set
//! `PDFIUM_LIB_PATH`, put the library in the per-user cache directory or the
//! working directory, or install it system-wide.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, MarkdownMode};
pub use document::memory::MemoryDocument;
pub use document::pdfium::PdfiumDocument;
pub use document::{PageArena, TextLine, TextSpan};
pub use error::{ExtractError, OcrError, PageError, StorageError};
pub use extract::{
    extract_batch, extract_document, extract_document_blocking, extract_from_bytes,
    extract_sync, extract_to_file, inspect, page_image_base64, process_document,
};
pub use output::{DocumentMetadata, ExtractionResult, ExtractionStats, PageContent};
#[cfg(feature = "ocr")]
pub use pipeline::ocr::OcrsRecognizer;
pub use pipeline::ocr::{OcrOutcome, PageState, TextRecognizer, UnavailableRecognizer};
pub use pipeline::paragraph::format_paragraphs;
pub use pipeline::repair::repair;
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use storage::FileStore;
