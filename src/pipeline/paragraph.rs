//! Plain-text paragraph formatter.
//!
//! Used when no structured Markdown is available for a page: OCR-recovered
//! text, backends without positioned glyphs, or [`crate::MarkdownMode::Heuristic`].
//! The input is expected to have been through [`super::repair::repair`] already.
//!
//! This is best-effort layout reconstruction. A sentence-final punctuation
//! mark followed by an uppercase letter is treated as a paragraph boundary,
//! whether the two sit on adjacent lines or on the same line.

use once_cell::sync::Lazy;
use regex::Regex;

/// Sentence-final mark, whitespace, then an uppercase letter.
static RE_INLINE_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([.!?:])[ \t]+(\p{Lu})").unwrap());

static RE_EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Turn unstructured extracted text into paragraph-delimited text.
///
/// ```
/// use edgequake_docextract::pipeline::paragraph::format_paragraphs;
///
/// let out = format_paragraphs("Hello world. Next sentence.\nMore text");
/// assert_eq!(out, "Hello world.\n\nNext sentence.\n\nMore text");
/// ```
pub fn format_paragraphs(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut pending_blank = false;
    let mut prev_ends_sentence = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            // Any run of blank lines becomes one separator, never a leading one.
            pending_blank = !out.is_empty();
            continue;
        }

        if !out.is_empty() {
            let starts_upper = trimmed.chars().next().is_some_and(char::is_uppercase);
            if pending_blank || (prev_ends_sentence && starts_upper) {
                out.push_str("\n\n");
            } else {
                out.push('\n');
            }
        }
        pending_blank = false;

        out.push_str(&RE_INLINE_BOUNDARY.replace_all(trimmed, "$1\n\n$2"));
        prev_ends_sentence = trimmed.ends_with(['.', '!', '?', ':']);
    }

    RE_EXCESS_NEWLINES
        .replace_all(&out, "\n\n")
        .trim()
        .to_string()
}
