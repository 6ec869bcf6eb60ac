//! Configuration types for document extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. Every knob lives in one struct, so a
//! config can be shared across threads and two runs can be compared field by
//! field.

use crate::error::ExtractError;
use crate::pipeline::ocr::{TextRecognizer, DEFAULT_OCR_MIN_CHARS};
use crate::pipeline::render::{DEFAULT_IMAGE_DPI, DEFAULT_OCR_DPI};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Configuration for one extraction.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docextract::{ExtractionConfig, MarkdownMode};
///
/// let config = ExtractionConfig::builder()
///     .ocr_min_chars(80)
///     .markdown(MarkdownMode::Heuristic)
///     .build()
///     .unwrap();
/// assert_eq!(config.ocr_dpi, 300);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Try to recover a text layer for near-empty pages. Default: true.
    pub ocr_enabled: bool,

    /// Pages with fewer non-whitespace characters than this are sent to OCR.
    /// Default: 50.
    ///
    /// A page number plus a running header is usually under 50 characters, so
    /// scanned pages with a stamped footer still trigger OCR, while a genuine
    /// short page (a title page, a dedication) rarely does.
    pub ocr_min_chars: usize,

    /// DPI pages are rendered at for OCR. Range: 72–600. Default: 300.
    ///
    /// Recognition accuracy drops sharply below 200 DPI on 10pt text.
    pub ocr_dpi: u32,

    /// DPI for page images returned to callers. Range: 72–400. Default: 150.
    pub image_dpi: u32,

    /// JPEG quality for page images. Range: 1–100. Default: 85.
    pub jpeg_quality: u8,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 5000.
    ///
    /// A safety cap independent of DPI: a 300 DPI render of an A0 poster would
    /// exceed 9 000 × 14 000 px. Either dimension is capped, the other scaled
    /// proportionally.
    pub max_rendered_pixels: u32,

    /// Which Markdown renderer to use. Default: [`MarkdownMode::Structured`].
    pub markdown: MarkdownMode,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Where OCR-enhanced documents are written. Default: the system temp dir.
    pub replacement_dir: Option<PathBuf>,

    /// Documents extracted at once by [`crate::extract_batch`]. Default: 4.
    ///
    /// Extraction is CPU-bound; each document runs on its own blocking thread.
    pub concurrency: usize,

    /// OCR capability. When `None`, OCR attempts fail as unavailable and
    /// short pages keep their original text.
    pub recognizer: Option<Arc<dyn TextRecognizer>>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            ocr_min_chars: DEFAULT_OCR_MIN_CHARS,
            ocr_dpi: DEFAULT_OCR_DPI,
            image_dpi: DEFAULT_IMAGE_DPI,
            jpeg_quality: 85,
            max_rendered_pixels: 5000,
            markdown: MarkdownMode::default(),
            password: None,
            replacement_dir: None,
            concurrency: 4,
            recognizer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("ocr_enabled", &self.ocr_enabled)
            .field("ocr_min_chars", &self.ocr_min_chars)
            .field("ocr_dpi", &self.ocr_dpi)
            .field("image_dpi", &self.image_dpi)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("markdown", &self.markdown)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("replacement_dir", &self.replacement_dir)
            .field("concurrency", &self.concurrency)
            .field("recognizer", &self.recognizer.as_ref().map(|r| r.name().to_string()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn ocr_enabled(mut self, v: bool) -> Self {
        self.config.ocr_enabled = v;
        self
    }

    pub fn ocr_min_chars(mut self, n: usize) -> Self {
        self.config.ocr_min_chars = n.max(1);
        self
    }

    pub fn ocr_dpi(mut self, dpi: u32) -> Self {
        self.config.ocr_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn image_dpi(mut self, dpi: u32) -> Self {
        self.config.image_dpi = dpi.clamp(72, 400);
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn markdown(mut self, mode: MarkdownMode) -> Self {
        self.config.markdown = mode;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn replacement_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.replacement_dir = Some(dir.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.config.recognizer = Some(recognizer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if !(72..=600).contains(&c.ocr_dpi) {
            return Err(ExtractError::InvalidConfig(format!(
                "OCR DPI must be 72–600, got {}",
                c.ocr_dpi
            )));
        }
        if !(72..=400).contains(&c.image_dpi) {
            return Err(ExtractError::InvalidConfig(format!(
                "Image DPI must be 72–400, got {}",
                c.image_dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if let Some(dir) = &c.replacement_dir {
            if dir.exists() && !dir.is_dir() {
                return Err(ExtractError::InvalidConfig(format!(
                    "Replacement directory '{}' is not a directory",
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which Markdown renderer produces page bodies.
///
/// | Mode | Source | Output |
/// |------|--------|--------|
/// | `Structured` | positioned glyphs with font sizes | headings, lists, emphasis, paragraphs |
/// | `Heuristic`  | cleaned plain text | paragraphs only |
///
/// Pages recovered by OCR always use the heuristic renderer: their text
/// layer carries no style information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkdownMode {
    #[default]
    Structured,
    Heuristic,
}

impl FromStr for MarkdownMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structured" | "full" => Ok(MarkdownMode::Structured),
            "heuristic" | "plain" => Ok(MarkdownMode::Heuristic),
            other => Err(format!(
                "unknown markdown mode '{other}' (expected 'structured' or 'heuristic')"
            )),
        }
    }
}

impl fmt::Display for MarkdownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkdownMode::Structured => f.write_str("structured"),
            MarkdownMode::Heuristic => f.write_str("heuristic"),
        }
    }
}
