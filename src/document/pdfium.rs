//! [`PageArena`] over a real PDF, backed by `pdfium-render`.
//!
//! ## Why pdfium?
//!
//! pdfium is the engine inside Chrome's PDF viewer. It copes with the broken
//! xref tables, odd font encodings and partial text layers that real uploads
//! contain, and it can rasterise, create pages and save in one library. The
//! price is a native shared library that must be found at runtime; see
//! [`bind_pdfium`].
//!
//! pdfium keeps global state and is not safe to call from async contexts.
//! Everything in this module is blocking and is called from
//! `spawn_blocking` by [`crate::extract`].

use super::{PageArena, TextLine, TextSpan};
use crate::error::{ExtractError, PageError};
use crate::output::DocumentMetadata;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming a pdfium library file or the directory holding it.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Font size the invisible OCR text layer is laid out with.
const TEXT_LAYER_FONT_SIZE: f32 = 10.0;

// ── Binding ──────────────────────────────────────────────────────────────────

/// Per-user directory where a pdfium library may be cached.
///
/// - **macOS**: `~/Library/Caches/edgequake-docextract/`
/// - **Linux**: `~/.cache/edgequake-docextract/`
/// - **Windows**: `%LOCALAPPDATA%\edgequake-docextract\`
pub fn pdfium_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
        .unwrap_or_else(std::env::temp_dir)
        .join("edgequake-docextract")
}

/// Bind to a pdfium library.
///
/// Resolution order, first hit wins:
/// 1. `PDFIUM_LIB_PATH` (a library file, or a directory containing one)
/// 2. [`pdfium_cache_dir`]
/// 3. the current working directory
/// 4. the system library search path
pub fn bind_pdfium() -> Result<Pdfium, ExtractError> {
    let mut attempts: Vec<String> = Vec::new();

    if let Ok(configured) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        let configured = PathBuf::from(configured);
        let lib = if configured.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&configured)
        } else {
            configured
        };
        match Pdfium::bind_to_library(&lib) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}: {}", PDFIUM_LIB_PATH_ENV, lib.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => attempts.push(format!("{}: {:?}", lib.display(), e)),
        }
    }

    for dir in [pdfium_cache_dir(), PathBuf::from("./")] {
        let lib = Pdfium::pdfium_platform_library_name_at_path(&dir);
        if !lib.exists() {
            continue;
        }
        match Pdfium::bind_to_library(&lib) {
            Ok(bindings) => {
                debug!("Bound pdfium from {}", lib.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => attempts.push(format!("{}: {:?}", lib.display(), e)),
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            debug!("Bound system pdfium library");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            attempts.push(format!("system library: {:?}", e));
            Err(ExtractError::PdfiumBindingFailed(attempts.join("; ")))
        }
    }
}

// ── Document ─────────────────────────────────────────────────────────────────

/// An open PDF. Dropping it releases the pdfium handle.
pub struct PdfiumDocument<'a> {
    document: PdfDocument<'a>,
    path: PathBuf,
    max_rendered_pixels: u32,
}

impl<'a> PdfiumDocument<'a> {
    /// Open `path`, mapping pdfium's load errors onto the fatal taxonomy.
    pub fn open(
        pdfium: &'a Pdfium,
        path: &Path,
        password: Option<&'a str>,
        max_rendered_pixels: u32,
    ) -> Result<Self, ExtractError> {
        let document = pdfium
            .load_pdf_from_file(path, password)
            .map_err(|e| map_load_error(path, password.is_some(), e))?;
        info!("PDF loaded: {} pages", document.pages().len());
        Ok(Self {
            document,
            path: path.to_path_buf(),
            max_rendered_pixels,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Title, author and friends, plus page count and PDF version.
    pub fn metadata(&self) -> DocumentMetadata {
        let metadata = self.document.metadata();
        let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
            metadata
                .get(tag)
                .map(|t| t.value().trim().to_string())
                .filter(|v| !v.is_empty())
        };

        DocumentMetadata {
            title: get_meta(PdfDocumentMetadataTagType::Title),
            author: get_meta(PdfDocumentMetadataTagType::Author),
            subject: get_meta(PdfDocumentMetadataTagType::Subject),
            creator: get_meta(PdfDocumentMetadataTagType::Creator),
            producer: get_meta(PdfDocumentMetadataTagType::Producer),
            creation_date: get_meta(PdfDocumentMetadataTagType::CreationDate),
            modification_date: get_meta(PdfDocumentMetadataTagType::ModificationDate),
            page_count: self.document.pages().len() as usize,
            pdf_version: format!("{:?}", self.document.version()),
        }
    }

    fn page(&self, index: usize) -> Result<PdfPage<'_>, PdfiumError> {
        let index = PdfPageIndex::try_from(index).map_err(|_| PdfiumError::PageIndexOutOfBounds)?;
        self.document.pages().get(index)
    }
}

fn map_load_error(path: &Path, had_password: bool, e: PdfiumError) -> ExtractError {
    let detail = format!("{:?}", e);
    if detail.contains("Password") || detail.contains("password") {
        if had_password {
            ExtractError::WrongPassword {
                path: path.to_path_buf(),
            }
        } else {
            ExtractError::PasswordRequired {
                path: path.to_path_buf(),
            }
        }
    } else {
        ExtractError::InvalidDocument {
            path: path.to_path_buf(),
            detail,
        }
    }
}

impl PageArena for PdfiumDocument<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_text(&self, index: usize) -> Result<String, PageError> {
        let text_err = |e: PdfiumError| PageError::TextUnavailable {
            page: index + 1,
            detail: format!("{:?}", e),
        };
        let page = self.page(index).map_err(text_err)?;
        let text = page.text().map_err(text_err)?;
        Ok(text.all())
    }

    fn page_lines(&self, index: usize) -> Result<Vec<TextLine>, PageError> {
        let text_err = |e: PdfiumError| PageError::TextUnavailable {
            page: index + 1,
            detail: format!("{:?}", e),
        };
        let page = self.page(index).map_err(text_err)?;
        let page_height = page.height().value;
        let text = page.text().map_err(text_err)?;

        let mut builder = LineBuilder::default();
        for ch in text.chars().iter() {
            let Some(s) = ch.unicode_string() else {
                continue;
            };
            if s == "\r" || s == "\n" || s == "\r\n" {
                builder.break_line();
                continue;
            }
            let size = ch.scaled_font_size().value;
            let top = ch
                .loose_bounds()
                .map(|b| page_height - b.top().value)
                .unwrap_or(builder.last_top);
            let font = ch.font_name().to_ascii_lowercase();
            builder.push(&s, top, size, is_bold_font(&font), is_italic_font(&font));
        }
        let lines = builder.finish();
        debug!("Page {}: {} positioned lines", index + 1, lines.len());
        Ok(lines)
    }

    fn render_page(&self, index: usize, dpi: u32) -> Result<DynamicImage, PageError> {
        let render_err = |e: PdfiumError| PageError::RenderFailed {
            page: index + 1,
            detail: format!("{:?}", e),
        };
        let page = self.page(index).map_err(render_err)?;
        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(dpi as f32 / 72.0)
            .set_maximum_width(self.max_rendered_pixels as i32)
            .set_maximum_height(self.max_rendered_pixels as i32);
        let bitmap = page.render_with_config(&render_config).map_err(render_err)?;
        let image = bitmap.as_image();
        debug!(
            "Rendered page {} at {} DPI → {}x{} px",
            index + 1,
            dpi,
            image.width(),
            image.height()
        );
        Ok(image)
    }

    fn replace_page(
        &mut self,
        index: usize,
        image: &DynamicImage,
        text: &str,
    ) -> Result<(), PageError> {
        let replace_err = |e: PdfiumError| PageError::ReplaceFailed {
            page: index + 1,
            detail: format!("{:?}", e),
        };
        let page_index =
            PdfPageIndex::try_from(index).map_err(|_| replace_err(PdfiumError::PageIndexOutOfBounds))?;
        let (width, height) = {
            let old = self.page(index).map_err(replace_err)?;
            (old.width(), old.height())
        };
        let font = self.document.fonts_mut().helvetica();

        let mut page = self
            .document
            .pages_mut()
            .create_page_at_index(PdfPagePaperSize::Custom(width, height), page_index)
            .map_err(replace_err)?;
        if let Err(e) = fill_replacement(&mut page, image, text, font, width, height) {
            if let Err(rollback) = page.delete() {
                warn!("Page {}: could not remove partial replacement: {:?}", index + 1, rollback);
            }
            return Err(replace_err(e));
        }
        drop(page);

        // The new page now sits at `index`; the page it replaces moved to `index + 1`.
        let removed = page_index
            .checked_add(1)
            .ok_or(PdfiumError::PageIndexOutOfBounds)
            .and_then(|old_index| self.document.pages().get(old_index))
            .and_then(|old| old.delete());
        if let Err(e) = removed {
            if let Err(rollback) = self.document.pages().get(page_index).and_then(|new| new.delete()) {
                warn!("Page {}: could not remove partial replacement: {:?}", index + 1, rollback);
            }
            return Err(replace_err(e));
        }
        debug!("Replaced page {} with OCR text layer", index + 1);
        Ok(())
    }

    fn save_to(&self, path: &Path) -> Result<(), ExtractError> {
        self.document
            .save_to_file(path)
            .map_err(|e| ExtractError::OutputWriteFailed {
                path: path.to_path_buf(),
                source: std::io::Error::other(format!("{:?}", e)),
            })
    }
}

/// Draw the page image full-bleed and lay `text` over it as invisible
/// Helvetica lines, top to bottom.
fn fill_replacement(
    page: &mut PdfPage<'_>,
    image: &DynamicImage,
    text: &str,
    font: PdfFontToken,
    width: PdfPoints,
    height: PdfPoints,
) -> Result<(), PdfiumError> {
    let objects = page.objects_mut();
    objects.create_image_object(PdfPoints::ZERO, PdfPoints::ZERO, image, Some(width), Some(height))?;

    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let step = (height.value / (lines.len() as f32 + 1.0)).min(TEXT_LAYER_FONT_SIZE * 1.2);
    for (i, line) in lines.iter().enumerate() {
        let y = height.value - step * (i as f32 + 1.0);
        let mut object = objects.create_text_object(
            PdfPoints::new(0.0),
            PdfPoints::new(y.max(0.0)),
            line,
            font,
            PdfPoints::new(TEXT_LAYER_FONT_SIZE),
        )?;
        if let Some(text_object) = object.as_text_object_mut() {
            text_object.set_render_mode(PdfPageTextRenderMode::Invisible)?;
        }
    }
    Ok(())
}

// ── Line assembly ────────────────────────────────────────────────────────────

fn is_bold_font(lower_name: &str) -> bool {
    ["bold", "black", "heavy", "semibold", "demi"]
        .iter()
        .any(|k| lower_name.contains(k))
}

fn is_italic_font(lower_name: &str) -> bool {
    lower_name.contains("italic") || lower_name.contains("oblique")
}

/// Groups pdfium characters into lines of same-style spans.
///
/// A new line starts on an explicit line break or when the character's top
/// edge moves by more than half its font size.
#[derive(Default)]
struct LineBuilder {
    lines: Vec<TextLine>,
    current: Option<TextLine>,
    last_top: f32,
}

impl LineBuilder {
    fn push(&mut self, s: &str, top: f32, size: f32, bold: bool, italic: bool) {
        let jumped = self
            .current
            .as_ref()
            .is_some_and(|line| (line.top - top).abs() > size.max(1.0) * 0.5);
        if jumped {
            self.break_line();
        }
        self.last_top = top;

        let line = self.current.get_or_insert_with(|| TextLine::new(top, Vec::new()));
        match line.spans.last_mut() {
            Some(span)
                if span.bold == bold
                    && span.italic == italic
                    && (span.font_size - size).abs() < 0.5 =>
            {
                span.text.push_str(s);
            }
            _ => line.spans.push(TextSpan {
                text: s.to_string(),
                font_size: size,
                bold,
                italic,
            }),
        }
    }

    fn break_line(&mut self) {
        if let Some(line) = self.current.take() {
            if !line.text().trim().is_empty() {
                self.lines.push(line);
            }
        }
    }

    fn finish(mut self) -> Vec<TextLine> {
        self.break_line();
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_style_detection() {
        assert!(is_bold_font("helvetica-bold"));
        assert!(is_bold_font("arial black"));
        assert!(!is_bold_font("times-roman"));
        assert!(is_italic_font("times-italic"));
        assert!(is_italic_font("helvetica-oblique"));
        assert!(!is_italic_font("courier"));
    }

    #[test]
    fn line_builder_splits_on_vertical_jump() {
        let mut b = LineBuilder::default();
        for c in ["H", "i"] {
            b.push(c, 100.0, 12.0, false, false);
        }
        for c in ["y", "o"] {
            b.push(c, 120.0, 12.0, false, false);
        }
        let lines = b.finish();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "Hi");
        assert_eq!(lines[1].text(), "yo");
    }

    #[test]
    fn line_builder_splits_spans_on_style_change() {
        let mut b = LineBuilder::default();
        b.push("a", 50.0, 11.0, false, false);
        b.push("b", 50.0, 11.0, true, false);
        b.push("c", 50.2, 11.0, true, false);
        let lines = b.finish();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].spans.len(), 2);
        assert_eq!(lines[0].spans[1].text, "bc");
        assert!(lines[0].spans[1].bold);
    }

    #[test]
    fn line_builder_drops_blank_lines() {
        let mut b = LineBuilder::default();
        b.push(" ", 10.0, 11.0, false, false);
        b.break_line();
        b.push("x", 30.0, 11.0, false, false);
        assert_eq!(b.finish().len(), 1);
    }

    #[test]
    fn password_errors_follow_whether_one_was_given() {
        let path = Path::new("locked.pdf");
        let password_error =
            || PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError);
        assert!(matches!(
            map_load_error(path, false, password_error()),
            ExtractError::PasswordRequired { .. }
        ));
        assert!(matches!(
            map_load_error(path, true, password_error()),
            ExtractError::WrongPassword { .. }
        ));
        let format_error =
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FormatError);
        assert!(matches!(
            map_load_error(path, true, format_error),
            ExtractError::InvalidDocument { .. }
        ));
    }

    #[test]
    fn cache_dir_is_namespaced() {
        assert!(pdfium_cache_dir().ends_with("edgequake-docextract"));
    }
}
