//! Extraction entry points.
//!
//! ## Pipeline
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Validate   exists, readable, %PDF signature
//!  ├─ 2. Open       pdfium handle owned by this call (spawn_blocking)
//!  ├─ 3. Raw text   per page: whitespace/de-hyphenation flags → encoding repair
//!  ├─ 4. OCR        near-empty pages rendered, recognised, replaced in place
//!  ├─ 5. Markdown   structured or heuristic renderer, "## Page N" markers
//!  ├─ 6. Check      every page blank → EmptyDocument
//!  ├─ 7. Assemble   pages joined with "\n\n"
//!  └─ 8. Persist    modified document written once, path handed to the caller
//! ```
//!
//! Steps 3–8 are [`process_document`], which works on any [`PageArena`].
//!
//! ## Why spawn_blocking?
//!
//! Extraction is CPU-bound and pdfium is not async-safe. Each call runs on
//! Tokio's blocking pool with its own document handle, so the request-handling
//! threads stay responsive and concurrent extractions share nothing.
//! There is no cancellation: apply an external timeout and drop the future if
//! needed. The blocking task then finishes in the background, and nothing is
//! written outside the system temp dir until it returns.

use crate::config::ExtractionConfig;
use crate::document::pdfium::{bind_pdfium, PdfiumDocument};
use crate::document::PageArena;
use crate::error::{ExtractError, PageError};
use crate::output::{
    page_markdown, DocumentMetadata, ExtractionResult, ExtractionStats, PageContent,
    PAGE_SEPARATOR,
};
use crate::pipeline::markdown::{renderer_for, HeuristicMarkdown, MarkdownRenderer};
use crate::pipeline::ocr::{OcrFallback, OcrOutcome, TextRecognizer, UnavailableRecognizer};
use crate::pipeline::repair::non_whitespace_len;
use crate::pipeline::{extract, input, render};
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract per-page text and Markdown from a PDF.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal errors:
/// - File not found / permission denied
/// - Not a valid PDF, or encrypted without the right password
/// - No page yields any text, even after OCR fallback
///
/// Per-page failures (unreadable text layer, OCR unavailable, rendering
/// errors) are logged and absorbed.
///
/// # Example
/// ```rust,no_run
/// use edgequake_docextract::{extract_document, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let result = extract_document("report.pdf", &ExtractionConfig::default()).await?;
/// println!("{}", result.markdown_content);
/// if let Some(path) = &result.replaced_document_path {
///     eprintln!("OCR-enhanced copy written to {}", path.display());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn extract_document(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, ExtractError> {
    let path = input::validate_pdf_path(path.as_ref())?;
    let config = config.clone();

    tokio::task::spawn_blocking(move || extract_document_blocking(&path, &config))
        .await
        .map_err(|e| ExtractError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of [`extract_document`], for callers already on a
/// worker thread.
///
/// The pdfium handle is released before this returns, on success and on error,
/// so the caller may delete `path` immediately afterwards.
pub fn extract_document_blocking(
    path: &Path,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, ExtractError> {
    let path = input::validate_pdf_path(path)?;
    info!("Starting extraction: {}", path.display());

    let pdfium = bind_pdfium()?;
    let mut document = PdfiumDocument::open(
        &pdfium,
        &path,
        config.password.as_deref(),
        config.max_rendered_pixels,
    )?;
    let result = process_document(&mut document, config);
    drop(document);
    result
}

/// Run the extraction pipeline over an already-open document.
///
/// Pages are processed sequentially: OCR replacement mutates the document by
/// index.
pub fn process_document(
    doc: &mut dyn PageArena,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, ExtractError> {
    let start = Instant::now();
    let total = doc.page_count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(total);
    }

    // ── Step 1: Raw text ─────────────────────────────────────────────────
    let (mut raw_pages, text_errors) = extract::extract_raw_pages(&*doc);
    if let Some(ref cb) = config.progress_callback {
        for (i, text) in raw_pages.iter().enumerate() {
            cb.on_page_extracted(i + 1, total, non_whitespace_len(text));
        }
    }

    // ── Step 2: OCR fallback ─────────────────────────────────────────────
    let mut outcome = if config.ocr_enabled {
        let fallback_recognizer: Arc<dyn TextRecognizer> = Arc::new(UnavailableRecognizer);
        let recognizer = config.recognizer.as_ref().unwrap_or(&fallback_recognizer);
        OcrFallback::new(&**recognizer, config.ocr_min_chars, config.ocr_dpi)
            .with_progress(config.progress_callback.as_ref())
            .run(doc, &raw_pages)
    } else {
        OcrOutcome::untouched(total)
    };
    for (&index, text) in &outcome.recovered {
        raw_pages[index] = text.clone();
    }
    let mut page_errors: Vec<Vec<PageError>> = vec![Vec::new(); total];
    for e in text_errors.into_iter().chain(std::mem::take(&mut outcome.errors)) {
        match e.page().checked_sub(1).and_then(|i| page_errors.get_mut(i)) {
            Some(slot) => slot.push(e),
            None => debug!("Dropping error for unknown page: {}", e),
        }
    }

    // ── Step 3: Markdown ─────────────────────────────────────────────────
    let renderer = renderer_for(config.markdown);
    debug!("Markdown renderer: {}", renderer.name());
    let view: &dyn PageArena = &*doc;
    let markdown_pages: Vec<String> = raw_pages
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let body = if outcome.recovered.contains_key(&index) {
                HeuristicMarkdown.render(view, index, text)
            } else {
                renderer.render(view, index, text)
            };
            page_markdown(index + 1, &body)
        })
        .collect();

    // ── Step 4: Empty check ──────────────────────────────────────────────
    if raw_pages.iter().all(|p| p.trim().is_empty()) {
        warn!("No extractable text in any of the {} pages", total);
        return Err(ExtractError::EmptyDocument { page_count: total });
    }

    // ── Step 5: Assemble ─────────────────────────────────────────────────
    let raw_text = raw_pages.join(PAGE_SEPARATOR);
    let markdown_content = markdown_pages.join(PAGE_SEPARATOR);
    let pages: Vec<PageContent> = raw_pages
        .into_iter()
        .zip(markdown_pages)
        .zip(page_errors)
        .enumerate()
        .map(|(index, ((raw_text, markdown_text), errors))| PageContent {
            index,
            raw_text,
            markdown_text,
            has_ocr_replacement: outcome.recovered.contains_key(&index),
            errors,
        })
        .collect();

    // ── Step 6: Persist replacement ──────────────────────────────────────
    let replaced_document_path = if outcome.document_modified() {
        persist_replacement(doc, config)
    } else {
        None
    };

    let stats = ExtractionStats {
        ocr_attempted: outcome.attempted,
        ocr_recovered: outcome.recovered.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Extraction complete: {} pages, {}/{} OCR recovered, {}ms",
        total, stats.ocr_recovered, stats.ocr_attempted, stats.duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(total, stats.ocr_recovered);
    }

    Ok(ExtractionResult {
        raw_text,
        markdown_content,
        page_count: total,
        replaced_document_path,
        pages,
        stats,
    })
}

/// Write the modified document to a fresh `ocr-*.pdf` file and hand the path
/// over. On failure the partial file is removed and `None` returned; the
/// recovered text is still part of the result.
fn persist_replacement(doc: &dyn PageArena, config: &ExtractionConfig) -> Option<PathBuf> {
    let dir = config
        .replacement_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);

    let kept = tempfile::Builder::new()
        .prefix("ocr-")
        .suffix(".pdf")
        .tempfile_in(&dir)
        .map_err(|e| e.to_string())
        .and_then(|file| file.keep().map_err(|e| e.to_string()));
    let path = match kept {
        Ok((handle, path)) => {
            drop(handle);
            path
        }
        Err(e) => {
            warn!("Could not create replacement file in {}: {}", dir.display(), e);
            return None;
        }
    };

    match doc.save_to(&path) {
        Ok(()) => {
            info!("OCR-enhanced document written to {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!("{}", e);
            if let Err(rm) = std::fs::remove_file(&path) {
                debug!("Could not remove {}: {}", path.display(), rm);
            }
            None
        }
    }
}

/// Extract from PDF bytes held in memory.
///
/// The bytes are written to a managed [`tempfile`] that is removed once
/// extraction returns; the document handle is released first.
///
/// # Example
/// ```rust,no_run
/// use edgequake_docextract::{extract_from_bytes, ExtractionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("upload.pdf")?;
/// let result = extract_from_bytes(&bytes, &ExtractionConfig::default()).await?;
/// println!("{} pages", result.page_count);
/// # Ok(())
/// # }
/// ```
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionResult, ExtractError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("upload-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| ExtractError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| ExtractError::Internal(format!("tempfile write: {e}")))?;
    // `tmp` is dropped (and the file deleted) when extraction returns
    extract_document(tmp.path(), config).await
}

/// Extract many documents, at most `config.concurrency` at a time.
///
/// Each document gets its own handle and blocking thread. Results are in
/// input order; one document failing does not affect the others.
pub async fn extract_batch<P: AsRef<Path>>(
    paths: &[P],
    config: &ExtractionConfig,
) -> Vec<Result<ExtractionResult, ExtractError>> {
    info!("Batch extraction: {} documents", paths.len());
    stream::iter(paths.iter().map(|p| extract_document(p.as_ref(), config)))
        .buffered(config.concurrency.max(1))
        .collect()
        .await
}

/// Extract a PDF and write its Markdown to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, ExtractError> {
    let result = extract_document(path, config).await?;
    let out = output_path.as_ref();
    let write_err = |source| ExtractError::OutputWriteFailed {
        path: out.to_path_buf(),
        source,
    };

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = out.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, &result.markdown_content)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, out).await.map_err(write_err)?;

    Ok(result)
}

/// Synchronous wrapper around [`extract_document`].
///
/// Creates a temporary tokio runtime internally; do not call from inside one.
pub fn extract_sync(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionResult, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract_document(path, config))
}

/// Read PDF metadata without extracting text.
///
/// Opens with `config.password`, so encrypted documents can be inspected too.
pub async fn inspect(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<DocumentMetadata, ExtractError> {
    let path = input::validate_pdf_path(path.as_ref())?;
    let password = config.password.clone();
    let max_rendered_pixels = config.max_rendered_pixels;
    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document =
            PdfiumDocument::open(&pdfium, &path, password.as_deref(), max_rendered_pixels)?;
        Ok(document.metadata())
    })
    .await
    .map_err(|e| ExtractError::Internal(format!("Metadata task panicked: {}", e)))?
}

/// Render one page as a base64 JPEG for a multimodal consumer.
///
/// Uses `config.image_dpi` and `config.jpeg_quality`. Returns `None` for a
/// negative or out-of-range index and for any open or render failure.
pub async fn page_image_base64(
    path: impl AsRef<Path>,
    page_index: i64,
    config: &ExtractionConfig,
) -> Option<String> {
    let path = match input::validate_pdf_path(path.as_ref()) {
        Ok(path) => path,
        Err(e) => {
            debug!("Page image unavailable: {}", e);
            return None;
        }
    };
    let config = config.clone();

    let task = tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium().map_err(|e| debug!("{}", e)).ok()?;
        let document = PdfiumDocument::open(
            &pdfium,
            &path,
            config.password.as_deref(),
            config.max_rendered_pixels,
        )
        .map_err(|e| debug!("{}", e))
        .ok()?;
        render::render_page_base64(&document, page_index, config.image_dpi, config.jpeg_quality)
    });

    match task.await {
        Ok(image) => image,
        Err(e) => {
            warn!("Page image task panicked: {}", e);
            None
        }
    }
}
