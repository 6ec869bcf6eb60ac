//! Error types for the edgequake-docextract library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ExtractError`] — **Fatal**: the document cannot be extracted at all
//!   (not a PDF, corrupt, wrong password, or no page yields any text even
//!   after OCR fallback). Returned as `Err(ExtractError)` from the top-level
//!   `extract*` functions.
//!
//! * [`PageError`] — **Non-fatal**: a single page could not be read, rendered,
//!   recognised or replaced. The pipeline logs it, keeps whatever text it
//!   already had for that page and carries on with the rest of the document.
//!
//! [`OcrError`] is what a [`crate::pipeline::ocr::TextRecognizer`] returns; the
//! OCR fallback engine converts it into a [`PageError::OcrFailed`].
//! [`StorageError`] belongs to [`crate::storage::FileStore`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docextract library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// The file could not be opened as a PDF (bad signature, corrupt xref, …).
    #[error("'{path}' is not a valid PDF document: {detail}")]
    InvalidDocument { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    // ── Content errors ────────────────────────────────────────────────────
    /// Every page is blank after extraction and OCR fallback.
    #[error("No extractable text in any of the {page_count} pages (scanned or image-only document)")]
    EmptyDocument { page_count: usize },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or place the library next to the binary."
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// `true` for errors the uploader can fix by sending a different file.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ExtractError::InvalidDocument { .. }
                | ExtractError::PasswordRequired { .. }
                | ExtractError::WrongPassword { .. }
                | ExtractError::EmptyDocument { .. }
        )
    }

    /// Short message suitable for showing to the person who uploaded the file.
    ///
    /// Keeps "this is not a PDF" and "this PDF has no readable text" apart,
    /// since the remedy differs.
    pub fn user_message(&self) -> &'static str {
        match self {
            ExtractError::InvalidDocument { .. } => {
                "The uploaded file is not a valid PDF document."
            }
            ExtractError::PasswordRequired { .. } | ExtractError::WrongPassword { .. } => {
                "This PDF is password protected. Please upload an unlocked copy."
            }
            ExtractError::EmptyDocument { .. } => {
                "This PDF appears to be scanned or image-based and our OCR engine could not read it. \
Please upload a clearer text-based PDF."
            }
            _ => "The document could not be processed due to an internal error.",
        }
    }
}

/// A non-fatal error for a single page.
///
/// Page numbers are 1-indexed, matching the `## Page N` markers.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// The page's text layer could not be read.
    #[error("Page {page}: text layer unavailable: {detail}")]
    TextUnavailable { page: usize, detail: String },

    /// Page rasterisation failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// The OCR capability failed or is not installed.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// OCR succeeded but the page could not be swapped in the document.
    #[error("Page {page}: page replacement failed: {detail}")]
    ReplaceFailed { page: usize, detail: String },
}

impl PageError {
    /// One-based number of the page this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::TextUnavailable { page, .. }
            | PageError::RenderFailed { page, .. }
            | PageError::OcrFailed { page, .. }
            | PageError::ReplaceFailed { page, .. } => *page,
        }
    }
}

/// Errors produced by an OCR capability.
#[derive(Debug, Clone, Error)]
pub enum OcrError {
    /// No OCR engine is installed or configured.
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    /// The engine ran but failed on this image.
    #[error("OCR recognition failed: {0}")]
    Recognition(String),
}

/// Errors from the file store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The id contains characters outside `[A-Za-z0-9_-]` or is too long.
    #[error("Invalid document id '{0}'")]
    InvalidId(String),

    /// No stored document has this id.
    #[error("No stored document with id '{0}'")]
    NotFound(String),

    /// Reading or writing the store failed.
    #[error("Storage I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
