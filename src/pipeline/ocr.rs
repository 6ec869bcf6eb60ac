//! OCR fallback: recover a text layer for pages that have (almost) none.
//!
//! Each page starts in [`PageState::TextSufficient`]. A page whose cleaned
//! text has fewer than `min_chars` non-whitespace characters is rendered at
//! the OCR resolution and handed to a [`TextRecognizer`]. If the recognised
//! text, after the same cleaning, clears the threshold, the page is replaced
//! in the document by one carrying the original image plus an invisible text
//! layer, and moves to [`PageState::OcrAttempted`].
//!
//! Every failure on the way (rendering, recognition, replacement) is scoped
//! to its page: it is logged, recorded in [`OcrOutcome::errors`], and the page
//! keeps its original text. Nothing here returns an error to the caller.
//!
//! Pages are processed one at a time. Replacement mutates the document by
//! index, so it is never run concurrently.

use super::extract::clean_page_text;
use super::repair::non_whitespace_len;
use crate::document::PageArena;
use crate::error::{OcrError, PageError};
use crate::progress::ProgressCallback;
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Pages with fewer non-whitespace characters than this are sent to OCR.
pub const DEFAULT_OCR_MIN_CHARS: usize = 50;

/// A synchronous OCR capability.
pub trait TextRecognizer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str {
        "ocr"
    }

    /// Recognise the text in a rendered page.
    fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError>;
}

/// The recogniser used when none is configured: every call fails with
/// [`OcrError::Unavailable`], so short pages keep their original text.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableRecognizer;

impl TextRecognizer for UnavailableRecognizer {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
        Err(OcrError::Unavailable(
            "no OCR engine configured (build with the `ocr` feature and load models)".into(),
        ))
    }
}

/// Per-page OCR state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageState {
    /// Initial state; also where a page stays when OCR fails.
    TextSufficient,
    /// OCR recovered enough text and the page was replaced.
    OcrAttempted,
}

/// What the fallback did to a document.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutcome {
    /// One state per page, in order.
    pub states: Vec<PageState>,
    /// Cleaned recovered text, keyed by zero-based index, for replaced pages only.
    pub recovered: BTreeMap<usize, String>,
    /// Pages that fell under the threshold and were sent to the recogniser.
    pub attempted: usize,
    /// Absorbed per-page failures.
    pub errors: Vec<PageError>,
}

impl OcrOutcome {
    /// Every page left as-is.
    pub fn untouched(page_count: usize) -> Self {
        Self {
            states: vec![PageState::TextSufficient; page_count],
            recovered: BTreeMap::new(),
            attempted: 0,
            errors: Vec::new(),
        }
    }

    /// Whether any page was replaced, i.e. the document needs persisting.
    pub fn document_modified(&self) -> bool {
        !self.recovered.is_empty()
    }
}

/// The OCR fallback engine for one extraction.
pub struct OcrFallback<'a> {
    recognizer: &'a dyn TextRecognizer,
    min_chars: usize,
    dpi: u32,
    progress: Option<&'a ProgressCallback>,
}

impl<'a> OcrFallback<'a> {
    pub fn new(recognizer: &'a dyn TextRecognizer, min_chars: usize, dpi: u32) -> Self {
        Self {
            recognizer,
            min_chars,
            dpi,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Option<&'a ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Whether `cleaned` is too short to stand as the page's text.
    pub fn needs_ocr(&self, cleaned: &str) -> bool {
        non_whitespace_len(cleaned) < self.min_chars
    }

    /// Run the fallback over every page. `pages` is the cleaned text of each
    /// page, indexed like the document.
    pub fn run(&self, doc: &mut dyn PageArena, pages: &[String]) -> OcrOutcome {
        let total = pages.len();
        let mut outcome = OcrOutcome::untouched(total);

        for (index, text) in pages.iter().enumerate() {
            if !self.needs_ocr(text) {
                continue;
            }
            outcome.attempted += 1;
            if let Some(cb) = self.progress {
                cb.on_ocr_attempted(index + 1, total);
            }
            debug!(
                "Page {}: {} chars below threshold {}, trying {}",
                index + 1,
                non_whitespace_len(text),
                self.min_chars,
                self.recognizer.name()
            );

            let recovered = match self.recover_page(doc, index) {
                Ok(Some(recovered)) => {
                    info!("Page {}: OCR recovered {} chars", index + 1, recovered.chars().count());
                    outcome.states[index] = PageState::OcrAttempted;
                    outcome.recovered.insert(index, recovered);
                    true
                }
                Ok(None) => false,
                Err(e) => {
                    warn!("{}", e);
                    outcome.errors.push(e);
                    false
                }
            };
            if let Some(cb) = self.progress {
                cb.on_ocr_result(index + 1, total, recovered);
            }
        }

        outcome
    }

    /// Render, recognise, and replace one page. `Ok(None)` means OCR ran but
    /// did not find enough text to be worth a replacement.
    fn recover_page(
        &self,
        doc: &mut dyn PageArena,
        index: usize,
    ) -> Result<Option<String>, PageError> {
        let image = doc.render_page(index, self.dpi)?;

        let recognised = self
            .recognizer
            .recognize(&image)
            .map_err(|e| PageError::OcrFailed {
                page: index + 1,
                detail: e.to_string(),
            })?;

        let cleaned = clean_page_text(&recognised);
        if self.needs_ocr(&cleaned) {
            debug!(
                "Page {}: OCR found only {} chars, keeping original text",
                index + 1,
                non_whitespace_len(&cleaned)
            );
            return Ok(None);
        }

        doc.replace_page(index, &image, &cleaned)?;
        Ok(Some(cleaned))
    }
}

// ── ocrs backend ─────────────────────────────────────────────────────────────

#[cfg(feature = "ocr")]
pub use self::ocrs_backend::OcrsRecognizer;

#[cfg(feature = "ocr")]
mod ocrs_backend {
    use super::TextRecognizer;
    use crate::error::OcrError;
    use image::DynamicImage;
    use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
    use rten::Model;
    use std::path::{Path, PathBuf};
    use tracing::{debug, info};

    const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
    const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

    /// Neural OCR via `ocrs`, with models executed by `rten`.
    ///
    /// Model loading is the expensive step; build one recogniser and share it
    /// through [`crate::config::ExtractionConfigBuilder::recognizer`].
    pub struct OcrsRecognizer {
        engine: OcrEngine,
    }

    impl OcrsRecognizer {
        /// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
        pub fn default_model_dir() -> PathBuf {
            dirs::cache_dir()
                .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
                .unwrap_or_else(|| PathBuf::from("."))
                .join("ocrs")
        }

        /// Load `text-detection.rten` and `text-recognition.rten` from `dir`.
        pub fn from_model_dir(dir: impl AsRef<Path>) -> Result<Self, OcrError> {
            let dir = dir.as_ref();
            let load = |name: &str| -> Result<Model, OcrError> {
                let path = dir.join(name);
                if !path.exists() {
                    return Err(OcrError::Unavailable(format!(
                        "model not found at {}; run `ocrs-cli` once to download models",
                        path.display()
                    )));
                }
                info!("Loading OCR model {}", path.display());
                Model::load_file(&path).map_err(|e| {
                    OcrError::Unavailable(format!("failed to load {}: {}", path.display(), e))
                })
            };

            let engine = OcrEngine::new(OcrEngineParams {
                detection_model: Some(load(DETECTION_MODEL_FILENAME)?),
                recognition_model: Some(load(RECOGNITION_MODEL_FILENAME)?),
                ..Default::default()
            })
            .map_err(|e| OcrError::Unavailable(format!("failed to initialise OCR engine: {}", e)))?;

            Ok(Self { engine })
        }

        /// Load models from [`Self::default_model_dir`].
        pub fn with_defaults() -> Result<Self, OcrError> {
            Self::from_model_dir(Self::default_model_dir())
        }
    }

    impl TextRecognizer for OcrsRecognizer {
        fn name(&self) -> &str {
            "ocrs"
        }

        fn recognize(&self, image: &DynamicImage) -> Result<String, OcrError> {
            let rgb = image.to_rgb8();
            let (width, height) = rgb.dimensions();
            let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|e| {
                OcrError::Recognition(format!("image source ({}x{}): {}", width, height, e))
            })?;
            let input = self
                .engine
                .prepare_input(source)
                .map_err(|e| OcrError::Recognition(format!("preprocessing: {}", e)))?;
            let text = self
                .engine
                .get_text(&input)
                .map_err(|e| OcrError::Recognition(e.to_string()))?;
            debug!("ocrs: {} lines from {}x{} image", text.lines().count(), width, height);
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::memory::MemoryDocument;

    const LONG: &str = "This page has plenty of real extracted text, well past fifty characters.";

    struct FixedRecognizer(&'static str);

    impl TextRecognizer for FixedRecognizer {
        fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
            Ok(self.0.to_string())
        }
    }

    fn pages(doc: &MemoryDocument) -> Vec<String> {
        (0..doc.page_count()).map(|i| doc.page_text(i).unwrap()).collect()
    }

    #[test]
    fn test_threshold() {
        let fb = OcrFallback::new(&UnavailableRecognizer, 50, 300);
        assert!(fb.needs_ocr(""));
        assert!(fb.needs_ocr(&"x ".repeat(49)));
        assert!(!fb.needs_ocr(&"x".repeat(50)));
    }

    #[test]
    fn test_sufficient_pages_untouched() {
        let mut doc = MemoryDocument::from_pages([LONG, LONG]).with_page_size(72.0, 72.0);
        let text = pages(&doc);
        let outcome = OcrFallback::new(&FixedRecognizer(LONG), 50, 72).run(&mut doc, &text);
        assert_eq!(outcome, OcrOutcome::untouched(2));
        assert!(!outcome.document_modified());
    }

    #[test]
    fn test_recovery_replaces_only_short_page() {
        let mut doc = MemoryDocument::from_pages([LONG, "  ", LONG]).with_page_size(72.0, 72.0);
        let text = pages(&doc);
        let outcome = OcrFallback::new(&FixedRecognizer(LONG), 50, 72).run(&mut doc, &text);
        assert_eq!(
            outcome.states,
            vec![PageState::TextSufficient, PageState::OcrAttempted, PageState::TextSufficient]
        );
        assert_eq!(outcome.recovered.get(&1).map(String::as_str), Some(LONG));
        assert_eq!(outcome.attempted, 1);
        assert!(doc.is_replaced(1));
        assert!(!doc.is_replaced(0));
        assert_eq!(doc.page_count(), 3);
    }

    #[test]
    fn test_recovered_text_is_repaired() {
        let mut doc = MemoryDocument::from_pages([""]).with_page_size(72.0, 72.0);
        let text = pages(&doc);
        let recognizer = FixedRecognizer("introduc3on of the na$onal \u{FB01}le system, a long sentence indeed");
        let outcome = OcrFallback::new(&recognizer, 50, 72).run(&mut doc, &text);
        assert_eq!(
            outcome.recovered[&0],
            "introduction of the national file system, a long sentence indeed"
        );
    }

    #[test]
    fn test_unavailable_engine_is_absorbed() {
        let mut doc = MemoryDocument::from_pages(["tiny"]).with_page_size(72.0, 72.0);
        let text = pages(&doc);
        let outcome = OcrFallback::new(&UnavailableRecognizer, 50, 72).run(&mut doc, &text);
        assert_eq!(outcome.states, vec![PageState::TextSufficient]);
        assert!(outcome.recovered.is_empty());
        assert!(matches!(outcome.errors[0], PageError::OcrFailed { page: 1, .. }));
        assert!(!doc.is_replaced(0));
    }

    #[test]
    fn test_short_ocr_result_keeps_original() {
        let mut doc = MemoryDocument::from_pages(["tiny"]).with_page_size(72.0, 72.0);
        let text = pages(&doc);
        let outcome = OcrFallback::new(&FixedRecognizer("still tiny"), 50, 72).run(&mut doc, &text);
        assert!(outcome.recovered.is_empty());
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.attempted, 1);
    }

    #[test]
    fn test_render_and_replace_failures_are_absorbed() {
        let mut doc = MemoryDocument::from_pages(["", ""])
            .with_page_size(72.0, 72.0)
            .fail_render_at(0)
            .fail_replace_at(1);
        let text = pages(&doc);
        let outcome = OcrFallback::new(&FixedRecognizer(LONG), 50, 72).run(&mut doc, &text);
        assert_eq!(outcome.states, vec![PageState::TextSufficient; 2]);
        assert!(matches!(outcome.errors[0], PageError::RenderFailed { page: 1, .. }));
        assert!(matches!(outcome.errors[1], PageError::ReplaceFailed { page: 2, .. }));
        assert!(!outcome.document_modified());
    }
}
