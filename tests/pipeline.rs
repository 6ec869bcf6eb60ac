//! Pipeline integration tests over in-memory documents.
//!
//! These run without pdfium: every document is a [`MemoryDocument`] and OCR
//! goes through small scripted recognizers.

use edgequake_docextract::pipeline::render::render_page_base64;
use edgequake_docextract::{
    extract_batch, process_document, ExtractError, ExtractionConfig, ExtractionProgressCallback,
    MarkdownMode, MemoryDocument, OcrError, PageArena, PageError, TextLine, TextRecognizer,
    TextSpan,
};
use image::DynamicImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const BODY: &str = "This page carries a perfectly healthy text layer with plenty of words.";
const RECOVERED: &str = "Recognised text from a scanned page, long enough to count as recovered.";

// ── Scripted recognizers ─────────────────────────────────────────────────────

struct FixedRecognizer {
    text: &'static str,
    calls: AtomicUsize,
}

impl FixedRecognizer {
    fn new(text: &'static str) -> Arc<Self> {
        Arc::new(Self {
            text,
            calls: AtomicUsize::new(0),
        })
    }
}

impl TextRecognizer for FixedRecognizer {
    fn name(&self) -> &str {
        "fixed"
    }

    fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.to_string())
    }
}

struct FailingRecognizer;

impl TextRecognizer for FailingRecognizer {
    fn recognize(&self, _image: &DynamicImage) -> Result<String, OcrError> {
        Err(OcrError::Recognition("model exploded".into()))
    }
}

/// `RUST_LOG=edgequake_docextract=debug cargo test --test pipeline` shows the
/// pipeline's own logs.
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config_with(recognizer: Arc<dyn TextRecognizer>, dir: &tempfile::TempDir) -> ExtractionConfig {
    ExtractionConfig::builder()
        .recognizer(recognizer)
        .ocr_dpi(72)
        .replacement_dir(dir.path())
        .build()
        .unwrap()
}

fn small_doc(pages: &[&str]) -> MemoryDocument {
    MemoryDocument::from_pages(pages.iter().copied()).with_page_size(72.0, 72.0)
}

fn ocr_files(dir: &tempfile::TempDir) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("ocr-") && n.ends_with(".pdf"))
        })
        .collect()
}

// ── OCR fallback ─────────────────────────────────────────────────────────────

#[test]
fn ocr_touches_only_the_scanned_page() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    let recognizer = FixedRecognizer::new(RECOVERED);
    let config = config_with(recognizer.clone(), &dir);
    let mut doc = small_doc(&[BODY, BODY, "", BODY, BODY]);

    let result = process_document(&mut doc, &config).unwrap();

    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
    assert_eq!(result.page_count, 5);
    for (i, page) in result.pages.iter().enumerate() {
        assert_eq!(page.has_ocr_replacement, i == 2, "page {}", i + 1);
    }
    assert_eq!(result.raw_pages()[2], RECOVERED);
    assert_eq!(result.raw_pages()[1], BODY);
    assert!(result.markdown_pages()[2].starts_with("## Page 3\n\n"));
    assert!(result.markdown_pages()[2].contains("Recognised text"));

    assert!(doc.is_replaced(2));
    assert!(!doc.is_replaced(0) && !doc.is_replaced(4));

    let path = result.replaced_document_path.expect("replacement persisted");
    assert!(path.exists());
    assert_eq!(path.parent(), Some(dir.path()));
    assert_eq!(result.stats.ocr_attempted, 1);
    assert_eq!(result.stats.ocr_recovered, 1);
}

const PAGES: [&str; 5] = [
    "Page one introduces the topic with enough words to keep its text layer.",
    "Page two continues the argument with enough words to keep its text layer.",
    "Fig. 3",
    "Page four presents the results with enough words to keep its text layer.",
    "Page five concludes the paper with enough words to keep its text layer.",
];

#[test]
fn failing_ocr_keeps_original_text_and_document() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(Arc::new(FailingRecognizer), &dir);
    let mut doc = small_doc(&PAGES);

    let result = process_document(&mut doc, &config).unwrap();

    assert_eq!(result.page_count, 5);
    assert_eq!(result.raw_pages(), PAGES.to_vec());
    for (i, page) in result.pages.iter().enumerate() {
        assert!(!page.has_ocr_replacement, "page {}", i + 1);
        assert!(!doc.is_replaced(i), "page {}", i + 1);
        assert!(page.markdown_text.starts_with(&format!("## Page {}\n\n", i + 1)));
        assert!(page.markdown_text.contains(PAGES[i]), "page {}", i + 1);
        if i != 2 {
            assert!(page.errors.is_empty(), "page {}", i + 1);
        }
    }
    assert!(matches!(
        result.pages[2].errors.as_slice(),
        [PageError::OcrFailed { page: 3, .. }]
    ));
    assert!(result.replaced_document_path.is_none());
    assert_eq!(result.stats.ocr_attempted, 1);
    assert_eq!(result.stats.ocr_recovered, 0);
    assert!(ocr_files(&dir).is_empty());
}

#[test]
fn failed_replacement_keeps_every_page_in_place() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(FixedRecognizer::new(RECOVERED), &dir);
    let mut doc = small_doc(&PAGES).fail_replace_at(2);

    let result = process_document(&mut doc, &config).unwrap();

    assert_eq!(doc.page_count(), 5);
    for (i, text) in PAGES.iter().enumerate() {
        assert_eq!(doc.page_text(i).unwrap(), *text, "page {}", i + 1);
    }
    assert_eq!(result.raw_pages(), PAGES.to_vec());
    assert!(result.markdown_pages()[3].starts_with("## Page 4\n\nPage four"));
    assert!(!result.pages[2].has_ocr_replacement);
    assert!(matches!(
        result.pages[2].errors.as_slice(),
        [PageError::ReplaceFailed { page: 3, .. }]
    ));
    assert!(result.replaced_document_path.is_none());
    assert!(ocr_files(&dir).is_empty());
}

#[test]
fn ocr_disabled_never_calls_the_recognizer() {
    let dir = tempfile::tempdir().unwrap();
    let recognizer = FixedRecognizer::new(RECOVERED);
    let config = ExtractionConfig::builder()
        .recognizer(recognizer.clone())
        .ocr_enabled(false)
        .replacement_dir(dir.path())
        .build()
        .unwrap();
    let mut doc = small_doc(&[BODY, ""]);

    let result = process_document(&mut doc, &config).unwrap();
    assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.stats.ocr_attempted, 0);
    assert_eq!(result.markdown_pages()[1], "## Page 2");
}

#[test]
fn save_failure_keeps_recovered_text_without_path() {
    init_logs();
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(FixedRecognizer::new(RECOVERED), &dir);
    let mut doc = small_doc(&[""]).fail_save();

    let result = process_document(&mut doc, &config).unwrap();
    assert_eq!(result.raw_text, RECOVERED);
    assert!(result.pages[0].has_ocr_replacement);
    assert!(result.replaced_document_path.is_none());
    assert!(ocr_files(&dir).is_empty(), "partial replacement left behind");
}

#[test]
fn scanned_only_document_is_recovered_not_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_with(FixedRecognizer::new(RECOVERED), &dir);
    let mut doc = small_doc(&["", " "]);

    let result = process_document(&mut doc, &config).unwrap();
    assert_eq!(result.stats.ocr_recovered, 2);
    assert_eq!(result.raw_text, format!("{RECOVERED}\n\n{RECOVERED}"));
}

#[test]
fn scanned_only_document_without_ocr_is_empty() {
    let mut doc = small_doc(&["", "\n", "\t "]);
    let err = process_document(&mut doc, &ExtractionConfig::default()).unwrap_err();
    assert!(matches!(err, ExtractError::EmptyDocument { page_count: 3 }));
    assert!(err.is_client_error());
    assert!(err.user_message().contains("scanned"));
}

// ── Page accounting ──────────────────────────────────────────────────────────

#[test]
fn page_lists_always_match_page_count() {
    let config = ExtractionConfig::builder().ocr_enabled(false).build().unwrap();
    for n in 1..=6 {
        let pages: Vec<&str> = (0..n).map(|i| if i % 2 == 0 { BODY } else { "" }).collect();
        let mut doc = small_doc(&pages);
        let result = process_document(&mut doc, &config).unwrap();

        assert_eq!(result.page_count, n);
        assert_eq!(result.pages.len(), n);
        assert_eq!(result.raw_pages().len(), n);
        for (i, md) in result.markdown_pages().iter().enumerate() {
            assert!(md.starts_with(&format!("## Page {}", i + 1)), "{md:?}");
        }
        assert_eq!(result.markdown_content.matches("## Page ").count(), n);
    }
}

#[test]
fn unreadable_text_layer_counts_as_blank_page() {
    let config = ExtractionConfig::builder().ocr_enabled(false).build().unwrap();
    let mut doc = small_doc(&[BODY, BODY, BODY]).fail_text_at(1);

    let result = process_document(&mut doc, &config).unwrap();
    assert_eq!(result.page_count, 3);
    assert_eq!(result.raw_pages()[1], "");
    assert_eq!(result.markdown_pages()[1], "## Page 2");
    assert!(matches!(
        result.pages[1].errors.as_slice(),
        [PageError::TextUnavailable { page: 2, .. }]
    ));
}

#[test]
fn broken_encodings_are_repaired_everywhere() {
    let config = ExtractionConfig::builder().ocr_enabled(false).build().unwrap();
    let page = "Sec3on 2 covers the a=ention mechanism and its applica3ons in \u{F001}ve parts.";
    let mut doc = small_doc(&[page]);

    let result = process_document(&mut doc, &config).unwrap();
    assert!(result.raw_text.contains("Section 2"), "{}", result.raw_text);
    assert!(result.raw_text.contains("attention mechanism"));
    assert!(result.raw_text.contains("applications in five parts"));
    assert!(result.markdown_content.contains("attention"));
    assert!(!result.markdown_content.contains('\u{F001}'));
}

// ── Markdown modes ───────────────────────────────────────────────────────────

fn styled_page() -> Vec<TextLine> {
    vec![
        TextLine::new(40.0, vec![TextSpan::plain("Results Overview", 18.0).bold()]),
        TextLine::new(
            80.0,
            vec![
                TextSpan::plain("The ", 11.0),
                TextSpan::plain("baseline", 11.0).italic(),
                TextSpan::plain(" improves on every benchmark we measured so far.", 11.0),
            ],
        ),
        TextLine::new(93.0, vec![TextSpan::plain("• first bullet item", 11.0)]),
        TextLine::new(106.0, vec![TextSpan::plain("• second bullet item", 11.0)]),
    ]
}

#[test]
fn structured_mode_uses_font_sizes() {
    let config = ExtractionConfig::builder().ocr_enabled(false).build().unwrap();
    let mut doc = MemoryDocument::from_lines([styled_page()]);

    let result = process_document(&mut doc, &config).unwrap();
    let md = result.markdown_pages()[0];
    assert!(md.contains("### Results Overview"), "{md}");
    assert!(md.contains("*baseline*"), "{md}");
    assert!(md.contains("- first bullet item"), "{md}");
    assert!(md.contains("- second bullet item"), "{md}");
}

#[test]
fn heuristic_mode_ignores_styling() {
    let config = ExtractionConfig::builder()
        .ocr_enabled(false)
        .markdown(MarkdownMode::Heuristic)
        .build()
        .unwrap();
    let mut doc = MemoryDocument::from_lines([styled_page()]);

    let result = process_document(&mut doc, &config).unwrap();
    let md = result.markdown_pages()[0];
    assert!(!md.contains("###"), "{md}");
    assert!(md.contains("Results Overview"));
    assert!(!md.contains("*baseline*"));
}

// ── Page images ──────────────────────────────────────────────────────────────

#[test]
fn page_image_bounds() {
    let doc = small_doc(&[BODY, BODY, BODY]);
    assert!(render_page_base64(&doc, -1, 72, 85).is_none());
    assert!(render_page_base64(&doc, 3, 72, 85).is_none());
    assert!(render_page_base64(&doc, i64::MAX, 72, 85).is_none());

    let last = render_page_base64(&doc, 2, 72, 85).expect("last page renders");
    // base64 of the JPEG SOI marker
    assert!(last.starts_with("/9j/"), "{}", &last[..8]);
}

#[test]
fn page_image_render_failure_is_none() {
    let doc = small_doc(&[BODY, BODY]).fail_render_at(1);
    assert!(render_page_base64(&doc, 0, 72, 85).is_some());
    assert!(render_page_base64(&doc, 1, 72, 85).is_none());
}

// ── Progress ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl ExtractionProgressCallback for Recorder {
    fn on_extraction_start(&self, total_pages: usize) {
        self.events.lock().unwrap().push(format!("start {total_pages}"));
    }
    fn on_page_extracted(&self, page_num: usize, _total: usize, _chars: usize) {
        self.events.lock().unwrap().push(format!("page {page_num}"));
    }
    fn on_ocr_attempted(&self, page_num: usize, _total: usize) {
        self.events.lock().unwrap().push(format!("ocr {page_num}"));
    }
    fn on_ocr_result(&self, page_num: usize, _total: usize, recovered: bool) {
        self.events
            .lock()
            .unwrap()
            .push(format!("ocr {page_num} {recovered}"));
    }
    fn on_extraction_complete(&self, total_pages: usize, ocr_recovered: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {total_pages} {ocr_recovered}"));
    }
}

#[test]
fn progress_events_follow_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let recorder = Arc::new(Recorder::default());
    let config = ExtractionConfig::builder()
        .recognizer(FixedRecognizer::new(RECOVERED))
        .ocr_dpi(72)
        .replacement_dir(dir.path())
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let mut doc = small_doc(&[BODY, ""]);

    process_document(&mut doc, &config).unwrap();
    let events = recorder.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec!["start 2", "page 1", "page 2", "ocr 2", "ocr 2 true", "done 2 1"]
    );
}

// ── Batch ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn batch_results_keep_input_order() {
    let dir = tempfile::tempdir().unwrap();
    let not_pdf = dir.path().join("notes.pdf");
    std::fs::write(&not_pdf, b"just some notes").unwrap();
    let missing = dir.path().join("missing.pdf");
    let folder = dir.path().join("folder.pdf");
    std::fs::create_dir(&folder).unwrap();

    let results = extract_batch(
        &[missing.clone(), not_pdf.clone(), folder],
        &ExtractionConfig::default(),
    )
    .await;

    assert_eq!(results.len(), 3);
    assert!(matches!(&results[0], Err(ExtractError::FileNotFound { path }) if *path == missing));
    assert!(matches!(&results[1], Err(ExtractError::InvalidDocument { path, .. }) if *path == not_pdf));
    assert!(matches!(&results[2], Err(ExtractError::InvalidDocument { .. })));
}
