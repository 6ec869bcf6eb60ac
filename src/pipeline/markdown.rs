//! Per-page Markdown: a capability interface with two renderers.
//!
//! * [`StructuredMarkdown`] reads positioned, styled lines from the document
//!   and reconstructs headings, list items, emphasis and paragraphs from
//!   font sizes and vertical gaps.
//! * [`HeuristicMarkdown`] formats already-cleaned plain text into paragraphs.
//!
//! The renderer is chosen once per extraction from
//! [`crate::MarkdownMode`] via [`renderer_for`]. Bodies returned here carry no
//! `## Page N` marker; the orchestrator adds it.
//!
//! ## Heading levels
//!
//! Level 2 is reserved for the page marker, so detected headings start at
//! `###`. A page title therefore never competes with the marker consumers
//! split on.

use super::paragraph::format_paragraphs;
use super::repair::repair;
use crate::config::MarkdownMode;
use crate::document::{PageArena, TextLine, TextSpan};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Renders the Markdown body of one page.
pub trait MarkdownRenderer: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Markdown body for page `index`. `cleaned_text` is the page's text after
    /// extraction flags and encoding repair.
    fn render(&self, doc: &dyn PageArena, index: usize, cleaned_text: &str) -> String;
}

/// Select the renderer for `mode`.
pub fn renderer_for(mode: MarkdownMode) -> Box<dyn MarkdownRenderer> {
    match mode {
        MarkdownMode::Structured => Box::new(StructuredMarkdown),
        MarkdownMode::Heuristic => Box::new(HeuristicMarkdown),
    }
}

// ── Heuristic ────────────────────────────────────────────────────────────────

/// Paragraph formatting of plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicMarkdown;

impl MarkdownRenderer for HeuristicMarkdown {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn render(&self, _doc: &dyn PageArena, _index: usize, cleaned_text: &str) -> String {
        format_paragraphs(cleaned_text)
    }
}

// ── Structured ───────────────────────────────────────────────────────────────

/// Font-size and layout driven Markdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredMarkdown;

impl MarkdownRenderer for StructuredMarkdown {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn render(&self, doc: &dyn PageArena, index: usize, cleaned_text: &str) -> String {
        match doc.page_lines(index) {
            Ok(lines) if lines.iter().any(|l| !l.text().trim().is_empty()) => {
                clean_markdown(&lines_to_markdown(&lines))
            }
            Ok(_) => format_paragraphs(cleaned_text),
            Err(e) => {
                warn!("{}; falling back to heuristic Markdown", e);
                format_paragraphs(cleaned_text)
            }
        }
    }
}

/// Body font size: the most common size on the page, weighted by characters.
fn body_font_size(lines: &[TextLine]) -> f32 {
    let mut weights: HashMap<i32, usize> = HashMap::new();
    for span in lines.iter().flat_map(|l| l.spans.iter()) {
        if span.font_size < 1.0 {
            continue;
        }
        let key = (span.font_size * 2.0).round() as i32;
        *weights.entry(key).or_insert(0) += span.text.chars().filter(|c| !c.is_whitespace()).count();
    }
    weights
        .into_iter()
        .max_by_key(|&(size, count)| (count, -size))
        .map(|(size, _)| size as f32 / 2.0)
        .unwrap_or(12.0)
}

fn heading_level(font_size: f32, body_size: f32) -> Option<usize> {
    let ratio = font_size / body_size;
    if ratio >= 1.5 {
        Some(3)
    } else if ratio >= 1.25 {
        Some(4)
    } else if ratio >= 1.1 {
        Some(5)
    } else {
        None
    }
}

const BULLETS: [char; 8] = ['•', '◦', '○', '●', '▪', '■', '‣', '–'];

fn is_list_item(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if BULLETS.contains(&c) => true,
        Some('-' | '*') => chars.next() == Some(' '),
        Some(c) if c.is_ascii_digit() => {
            let rest = text.trim_start_matches(|c: char| c.is_ascii_digit());
            text.len() - rest.len() <= 3 && (rest.starts_with(". ") || rest.starts_with(") "))
        }
        _ => false,
    }
}

fn format_list_item(text: &str) -> String {
    for bullet in BULLETS {
        if let Some(rest) = text.strip_prefix(bullet) {
            return format!("- {}", rest.trim_start());
        }
    }
    if let Some(rest) = text.strip_prefix("* ") {
        return format!("- {}", rest.trim_start());
    }
    text.to_string()
}

/// Wrap a span in emphasis markers, keeping its surrounding whitespace outside
/// them so `**bold** text` stays valid Markdown.
fn render_span(span: &TextSpan) -> String {
    let core = span.text.trim();
    if core.is_empty() || !(span.bold || span.italic) {
        return span.text.clone();
    }
    let marker = match (span.bold, span.italic) {
        (true, true) => "***",
        (true, false) => "**",
        _ => "*",
    };
    let lead = &span.text[..span.text.len() - span.text.trim_start().len()];
    let trail = &span.text[span.text.trim_end().len()..];
    format!("{lead}{marker}{core}{marker}{trail}")
}

fn render_line(line: &TextLine) -> String {
    line.spans.iter().map(render_span).collect::<String>().trim().to_string()
}

/// Append a body line to the open paragraph, joining a hyphenated wrap.
fn join_paragraph_line(paragraph: &mut String, line: &str) {
    if paragraph.is_empty() {
        paragraph.push_str(line);
        return;
    }
    let wrapped = paragraph.ends_with('-')
        && paragraph
            .chars()
            .rev()
            .nth(1)
            .is_some_and(char::is_alphabetic)
        && line.chars().next().is_some_and(char::is_lowercase);
    if wrapped {
        paragraph.pop();
    } else {
        paragraph.push(' ');
    }
    paragraph.push_str(line);
}

/// Reconstruct Markdown blocks from positioned lines.
pub fn lines_to_markdown(lines: &[TextLine]) -> String {
    let body = body_font_size(lines);
    let mut blocks: Vec<String> = Vec::new();
    let mut paragraph = String::new();
    let mut list: Vec<String> = Vec::new();
    let mut prev: Option<(f32, f32)> = None;

    let flush = |paragraph: &mut String, list: &mut Vec<String>, blocks: &mut Vec<String>| {
        if !paragraph.is_empty() {
            blocks.push(std::mem::take(paragraph));
        }
        if !list.is_empty() {
            blocks.push(list.join("\n"));
            list.clear();
        }
    };

    for line in lines {
        let plain = line.text();
        let plain = plain.trim();
        if plain.is_empty() {
            continue;
        }

        if let Some((prev_top, prev_size)) = prev {
            let gap = line.top - (prev_top + prev_size);
            if gap > body * 0.8 {
                flush(&mut paragraph, &mut list, &mut blocks);
            }
        }
        let size = line.font_size();
        prev = Some((line.top, size));

        if plain.chars().count() > 3 && plain.len() < 200 {
            if let Some(level) = heading_level(size, body) {
                flush(&mut paragraph, &mut list, &mut blocks);
                blocks.push(format!("{} {}", "#".repeat(level), plain));
                continue;
            }
        }

        if is_list_item(plain) {
            if !paragraph.is_empty() {
                blocks.push(std::mem::take(&mut paragraph));
            }
            list.push(format_list_item(&render_line(line)));
            continue;
        }

        // Continuation of the last list item.
        if let Some(last) = list.last_mut() {
            join_paragraph_line(last, &render_line(line));
            continue;
        }
        join_paragraph_line(&mut paragraph, &render_line(line));
    }
    flush(&mut paragraph, &mut list, &mut blocks);

    debug!("Structured Markdown: {} blocks, body size {}pt", blocks.len(), body);
    blocks.join("\n\n")
}

// ── Post-processing ──────────────────────────────────────────────────────────

static RE_IMAGE_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());

static RE_EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Cleanup applied to structured Markdown, in order:
///
/// 1. Normalise line endings (CRLF → LF)
/// 2. Trim trailing whitespace per line
/// 3. Remove image references (images are not served)
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 5. Encoding repair
/// 6. Collapse 3+ consecutive newlines to 2
pub fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = trim_trailing_whitespace(&s);
    let s = remove_image_refs(&s);
    let s = remove_invisible_chars(&s);
    let s = repair(&s);
    collapse_newlines(&s)
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 3: Remove image references ──────────────────────────────────────────

fn remove_image_refs(input: &str) -> String {
    RE_IMAGE_REF.replace_all(input, "").into_owned()
}

// ── Rule 4: Strip invisible Unicode ──────────────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input
        .chars()
        .filter(|c| !matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{00AD}'))
        .collect()
}

// ── Rule 6: Collapse excessive newlines ──────────────────────────────────────

fn collapse_newlines(input: &str) -> String {
    RE_EXCESS_NEWLINES
        .replace_all(input, "\n\n")
        .trim()
        .to_string()
}
