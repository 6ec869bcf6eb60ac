//! Pipeline stages for document extraction.
//!
//! Each submodule implements one transformation step and is testable on its
//! own against a [`crate::document::memory::MemoryDocument`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ repair ──▶ ocr ──▶ markdown ──▶ (orchestrator)
//! (path)    (flags)     (5 passes) (replace) (structured | paragraph)
//!
//!                       render ──▶ encode            (page images on demand)
//! ```
//!
//! 1. [`input`]: validate the path and `%PDF` signature
//! 2. [`extract`]: per-page text with whitespace and de-hyphenation flags
//! 3. [`repair`]: ligature and font-encoding repair; pure and idempotent
//! 4. [`ocr`]: recover text layers for near-empty pages
//! 5. [`markdown`]: per-page Markdown through a renderer chosen once
//! 6. [`paragraph`]: the plain-text paragraph formatter
//! 7. [`render`] / [`encode`]: page rasterisation to base64 JPEG

pub mod encode;
pub mod extract;
pub mod input;
pub mod markdown;
pub mod ocr;
pub mod paragraph;
pub mod render;
pub mod repair;
