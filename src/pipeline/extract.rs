//! Per-page raw text extraction.
//!
//! Two extraction flags run on the backend's text before encoding repair:
//!
//! * **Preserve whitespace**: interior runs of spaces are kept as-is; only
//!   line endings are normalised to `\n`.
//! * **De-hyphenate**: `infor-\nmation` becomes `information` when the
//!   hyphen follows a letter and the next line starts with a lowercase letter.

use super::repair::repair;
use crate::document::PageArena;
use crate::error::PageError;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

static RE_WRAPPED_HYPHEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\p{L})-[ \t]*\n[ \t]*(\p{Ll})").unwrap());

/// Normalise line endings and join words hyphenated across a line wrap.
pub fn apply_text_flags(raw: &str) -> String {
    let s = raw.replace("\r\n", "\n").replace('\r', "\n");
    RE_WRAPPED_HYPHEN.replace_all(&s, "$1$2").into_owned()
}

/// Extraction flags followed by encoding repair: the text a page contributes
/// to the result.
pub fn clean_page_text(raw: &str) -> String {
    repair(&apply_text_flags(raw))
}

/// Cleaned text of every page, in order, plus the pages whose text layer
/// could not be read. An unreadable page contributes an empty string.
pub fn extract_raw_pages(doc: &dyn PageArena) -> (Vec<String>, Vec<PageError>) {
    let count = doc.page_count();
    let mut pages = Vec::with_capacity(count);
    let mut errors = Vec::new();

    for index in 0..count {
        match doc.page_text(index) {
            Ok(raw) => {
                let cleaned = clean_page_text(&raw);
                debug!("Page {}: {} chars of text", index + 1, cleaned.chars().count());
                pages.push(cleaned);
            }
            Err(e) => {
                warn!("{}", e);
                errors.push(e);
                pages.push(String::new());
            }
        }
    }

    (pages, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::memory::MemoryDocument;

    #[test]
    fn test_line_endings_normalised() {
        assert_eq!(apply_text_flags("a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn test_interior_whitespace_preserved() {
        assert_eq!(apply_text_flags("col1    col2\tx"), "col1    col2\tx");
    }

    #[test]
    fn test_dehyphenation() {
        assert_eq!(apply_text_flags("infor-\nmation"), "information");
        assert_eq!(apply_text_flags("infor- \r\n  mation"), "information");
        assert_eq!(apply_text_flags("well-\nKnown"), "well-\nKnown");
        assert_eq!(apply_text_flags("2020-\n2021"), "2020-\n2021");
        assert_eq!(apply_text_flags("a - \nb"), "a - \nb");
    }

    #[test]
    fn test_clean_page_text_repairs() {
        assert_eq!(clean_page_text("introduc-\n3on"), "introduc-\n3on");
        assert_eq!(clean_page_text("na$onal \u{FB01}le"), "national file");
    }

    #[test]
    fn test_extract_raw_pages_keeps_order_and_absorbs_errors() {
        let doc = MemoryDocument::from_pages(["first", "second", "third"]).fail_text_at(1);
        let (pages, errors) = extract_raw_pages(&doc);
        assert_eq!(pages, vec!["first", "", "third"]);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], PageError::TextUnavailable { page: 2, .. }));
    }
}
