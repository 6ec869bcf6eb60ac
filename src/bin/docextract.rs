//! CLI binary for edgequake-docextract.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_docextract::{
    extract_batch, extract_document, inspect, page_image_base64, ExtractionConfig,
    ExtractionProgressCallback, ExtractionResult, MarkdownMode, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the extraction pass, plus a log
/// line for every page that goes through OCR.
struct CliProgressCallback {
    bar: ProgressBar,
    ocr_failed: AtomicUsize,
}

impl CliProgressCallback {
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_extraction_start
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            ocr_failed: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_pages: usize) {
        self.activate_bar(total_pages);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_pages} pages…"))
        ));
    }

    fn on_page_extracted(&self, page_num: usize, _total: usize, char_count: usize) {
        self.bar.set_message(format!("page {page_num} ({char_count} chars)"));
        self.bar.inc(1);
    }

    fn on_ocr_attempted(&self, page_num: usize, _total: usize) {
        self.bar.set_prefix("OCR");
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_ocr_result(&self, page_num: usize, total: usize, recovered: bool) {
        if recovered {
            self.bar.println(format!(
                "  {} Page {:>3}/{:<3}  {}",
                green("✓"),
                page_num,
                total,
                dim("text layer recovered"),
            ));
        } else {
            self.ocr_failed.fetch_add(1, Ordering::SeqCst);
            self.bar.println(format!(
                "  {} Page {:>3}/{:<3}  {}",
                red("✗"),
                page_num,
                total,
                red("OCR produced no usable text"),
            ));
        }
    }

    fn on_extraction_complete(&self, total_pages: usize, ocr_recovered: usize) {
        self.bar.finish_and_clear();
        let failed = self.ocr_failed.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} pages extracted  {}",
                green("✔"),
                bold(&total_pages.to_string()),
                dim(&format!("({ocr_recovered} recovered by OCR)")),
            );
        } else {
            eprintln!(
                "{} {} pages extracted  ({} recovered, {} still without text)",
                cyan("⚠"),
                bold(&total_pages.to_string()),
                ocr_recovered,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Markdown to stdout
  docextract paper.pdf

  # Markdown to a file
  docextract paper.pdf -o paper.md

  # Cleaned plain text instead of Markdown
  docextract --raw paper.pdf

  # Full per-page JSON (raw + markdown + OCR stats)
  docextract --json paper.pdf > paper.json

  # Several documents into a directory, four at a time
  docextract a.pdf b.pdf c.pdf -o out/ -c 4

  # Keep the OCR-enhanced copy of a scanned document
  docextract --keep-ocr-pdf enhanced/ scan.pdf

  # Fifth page as a base64 JPEG
  docextract --page-image 4 --dpi 150 slides.pdf

  # Metadata only
  docextract --inspect-only paper.pdf

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH      Path to libpdfium (file or directory)
  DOCEXTRACT_OCR_MODELS  Directory holding text-detection.rten / text-recognition.rten
  RUST_LOG             Overrides the log filter (e.g. edgequake_docextract=debug)

SETUP:
  pdfium is looked up in PDFIUM_LIB_PATH, then the user cache directory
  (e.g. ~/.cache/edgequake-docextract/), then the working directory, then
  the system library path.
"#;

/// Extract per-page text and Markdown from PDF files.
#[derive(Parser, Debug)]
#[command(
    name = "docextract",
    version,
    about = "Extract per-page text and Markdown from PDFs, repairing broken encodings",
    long_about = "Extract cleaned text and section-aware Markdown from PDF documents, one \
section per page. Broken ligature encodings are repaired, and pages without a usable text \
layer can be recovered with OCR (build with --features ocr).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files to extract.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output file (one input) or directory (several inputs).
    #[arg(short, long, env = "DOCEXTRACT_OUTPUT")]
    output: Option<PathBuf>,

    /// Output the full ExtractionResult as JSON.
    #[arg(long, env = "DOCEXTRACT_JSON", conflicts_with = "raw")]
    json: bool,

    /// Output cleaned plain text instead of Markdown.
    #[arg(long, env = "DOCEXTRACT_RAW")]
    raw: bool,

    /// Markdown renderer: structured (font-size aware) or heuristic.
    #[arg(long, env = "DOCEXTRACT_MARKDOWN_MODE", default_value = "structured")]
    markdown_mode: MarkdownMode,

    /// Disable the OCR fallback for near-empty pages.
    #[arg(long, env = "DOCEXTRACT_NO_OCR")]
    no_ocr: bool,

    /// Pages with fewer non-whitespace characters than this go through OCR.
    #[arg(long, env = "DOCEXTRACT_OCR_MIN_CHARS", default_value_t = 50)]
    ocr_min_chars: usize,

    /// Rendering DPI for OCR (72–600).
    #[arg(long, env = "DOCEXTRACT_OCR_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    ocr_dpi: u32,

    /// Directory holding the ocrs detection/recognition models.
    #[cfg(feature = "ocr")]
    #[arg(long, env = "DOCEXTRACT_OCR_MODELS")]
    ocr_models: Option<PathBuf>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCEXTRACT_PASSWORD")]
    password: Option<String>,

    /// Keep the OCR-enhanced PDF in this directory and print its path.
    #[arg(long, value_name = "DIR")]
    keep_ocr_pdf: Option<PathBuf>,

    /// Print PDF metadata only, no extraction.
    #[arg(long)]
    inspect_only: bool,

    /// Print one page (zero-based) as a base64 JPEG instead of extracting.
    #[arg(long, value_name = "INDEX", allow_negative_numbers = true)]
    page_image: Option<i64>,

    /// Rendering DPI for --page-image (72–400).
    #[arg(long, env = "DOCEXTRACT_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Documents extracted concurrently.
    #[arg(short, long, env = "DOCEXTRACT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCEXTRACT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCEXTRACT_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCEXTRACT_NO_PROGRESS")]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are noise while the progress bar is drawn.
    let single = cli.inputs.len() == 1;
    let show_progress = single && !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let mut builder = ExtractionConfig::builder();
        if let Some(ref pwd) = cli.password {
            builder = builder.password(pwd.clone());
        }
        let config = builder.build().context("Invalid configuration")?;
        for input in &cli.inputs {
            print_metadata(input, &config, cli.json).await?;
        }
        return Ok(());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new_dynamic() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Page image mode ──────────────────────────────────────────────────
    if let Some(index) = cli.page_image {
        for input in &cli.inputs {
            let image = page_image_base64(input, index, &config)
                .await
                .with_context(|| {
                    format!("Page {index} of {} could not be rendered", input.display())
                })?;
            println!("{image}");
        }
        return Ok(());
    }

    // ── Extraction ───────────────────────────────────────────────────────
    if single {
        let input = &cli.inputs[0];
        let result = extract_document(input, &config)
            .await
            .with_context(|| format!("Extraction failed for {}", input.display()))?;
        emit(&cli, input, &result, cli.output.as_deref())?;
        return Ok(());
    }

    let results = extract_batch(&cli.inputs, &config).await;
    let mut failed = 0usize;
    for (input, result) in cli.inputs.iter().zip(results) {
        match result {
            Ok(result) => {
                let target = cli
                    .output
                    .as_ref()
                    .map(|dir| dir.join(output_name(input, &cli)));
                emit(&cli, input, &result, target.as_deref())?;
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {}  {}", red("✗"), input.display(), red(&e.to_string()));
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} of {} documents failed", cli.inputs.len());
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .ocr_enabled(!cli.no_ocr)
        .ocr_min_chars(cli.ocr_min_chars)
        .ocr_dpi(cli.ocr_dpi)
        .image_dpi(cli.dpi)
        .markdown(cli.markdown_mode)
        .concurrency(cli.concurrency);

    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(ref dir) = cli.keep_ocr_pdf {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        builder = builder.replacement_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    #[cfg(feature = "ocr")]
    if !cli.no_ocr {
        use edgequake_docextract::OcrsRecognizer;
        let dir = cli
            .ocr_models
            .clone()
            .unwrap_or_else(OcrsRecognizer::default_model_dir);
        match OcrsRecognizer::from_model_dir(&dir) {
            Ok(recognizer) => builder = builder.recognizer(Arc::new(recognizer)),
            Err(e) => tracing::warn!("OCR disabled: {}", e),
        }
    }

    builder.build().context("Invalid configuration")
}

/// Print (or write) one document's result in the selected format.
fn emit(cli: &Cli, input: &Path, result: &ExtractionResult, target: Option<&Path>) -> Result<()> {
    let body = if cli.json {
        serde_json::to_string_pretty(result).context("Failed to serialise output")?
    } else if cli.raw {
        result.raw_text.clone()
    } else {
        result.markdown_content.clone()
    };

    match target {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::write(path, &body)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if !cli.quiet {
                eprintln!(
                    "{}  {}  {} pages  {}ms  →  {}",
                    green("✔"),
                    input.display(),
                    result.page_count,
                    result.stats.duration_ms,
                    bold(&path.display().to_string()),
                );
            }
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(body.as_bytes())
                .context("Failed to write to stdout")?;
            if !body.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if let Some(ref path) = result.replaced_document_path {
        if cli.keep_ocr_pdf.is_some() {
            if !cli.quiet {
                eprintln!("   OCR-enhanced PDF: {}", bold(&path.display().to_string()));
            }
        } else if let Err(e) = std::fs::remove_file(path) {
            tracing::debug!("Could not remove {}: {}", path.display(), e);
        }
    }
    Ok(())
}

fn output_name(input: &Path, cli: &Cli) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".into());
    let ext = if cli.json {
        "json"
    } else if cli.raw {
        "txt"
    } else {
        "md"
    };
    format!("{stem}.{ext}")
}

async fn print_metadata(input: &Path, config: &ExtractionConfig, json: bool) -> Result<()> {
    let meta = inspect(input, config)
        .await
        .with_context(|| format!("Failed to inspect {}", input.display()))?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&meta).context("Failed to serialize metadata")?
        );
        return Ok(());
    }

    println!("File:         {}", input.display());
    if let Some(ref t) = meta.title {
        println!("Title:        {}", t);
    }
    if let Some(ref a) = meta.author {
        println!("Author:       {}", a);
    }
    if let Some(ref s) = meta.subject {
        println!("Subject:      {}", s);
    }
    println!("Pages:        {}", meta.page_count);
    println!("PDF Version:  {}", meta.pdf_version);
    if let Some(ref p) = meta.producer {
        println!("Producer:     {}", p);
    }
    if let Some(ref c) = meta.creator {
        println!("Creator:      {}", c);
    }
    Ok(())
}
