//! CLI binary for mentorix.
//!
//! A thin shim over the library crate that maps CLI flags to `PackConfig`
//! and a `PackRequest`, then writes the PDFs and the ZIP bundle.

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mentorix::{
    extract_syllabus, generate_pack, write_pack, CustomQuestion, GenerationMode, LearningPack,
    OcrBackend, PackConfig, PackProgressCallback, PackRequest, ProgressCallback,
    QuestionBlueprint, QuestionPattern, SectionKind, Stage, TaxonomyTarget,
    DEFAULT_ARCHIVE_NAME,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

/// Spinner while extracting, then a bar per stage with one line per section.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<SectionKind, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Starting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, stage: Stage, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>2}/{len}  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_style(style);
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message("");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, section: SectionKind) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&section))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PackProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: Stage, steps: usize) {
        if steps > 1 {
            self.activate_bar(stage, steps);
        } else {
            self.bar.set_prefix(stage.to_string());
        }
    }

    fn on_section_start(&self, section: SectionKind) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(section, Instant::now());
        }
        self.bar.set_message(section.to_string());
    }

    fn on_section_complete(&self, section: SectionKind, chars: usize) {
        let secs = self.elapsed_secs(section);
        self.bar.println(format!(
            "  {} {:<20}  {}  {}",
            green("✓"),
            section.title(),
            dim(&format!("{chars:>6} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_section_error(&self, section: SectionKind, error: &str) {
        let secs = self.elapsed_secs(section);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let first_line = error.lines().next().unwrap_or(error);
        let msg = if first_line.chars().count() > 80 {
            let cut: String = first_line.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} {:<20}  {}  {}",
            red("✗"),
            section.title(),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_artifact_rendered(&self, name: &str, _bytes: usize) {
        self.bar.set_message(name.to_string());
        self.bar.inc(1);
    }

    fn on_pack_complete(&self, artifacts: usize, failed_sections: usize) {
        self.bar.finish_and_clear();
        if failed_sections == 0 {
            eprintln!(
                "{} {} PDFs generated",
                green("✔"),
                bold(&artifacts.to_string())
            );
        } else {
            eprintln!(
                "{} {} PDFs generated  ({} sections failed)",
                cyan("⚠"),
                bold(&artifacts.to_string()),
                red(&failed_sections.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Pack for a topic, written to ./mentorix_output
  mentorix --topic DBMS

  # Pack from a syllabus with extra instructions
  mentorix --syllabus syllabus.pdf --instructions "Focus on practical examples"

  # Question paper: 4 x 2 marks, 3 x 5 marks, one teacher question, Bloom split
  mentorix --topic "Operating Systems" --pattern 4x2 --pattern 3x5 \
      --custom "10:Compare paging and segmentation." --bloom Applying=3 --bloom Analyzing=2

  # Blueprint from a JSON file
  mentorix --topic Networks --blueprint paper.json

  # One combined LLM call instead of four
  mentorix --topic DBMS --mode combined

  # Only show the text extracted from a syllabus (no API key needed)
  mentorix --syllabus https://example.edu/syllabus.docx --extract-only

BLUEPRINT JSON:
  {
    "patterns": [{ "count": 4, "marks": 2 }, { "count": 2, "marks": 10 }],
    "custom":   [{ "text": "Explain normalization.", "marks": 5 }],
    "taxonomy": [{ "level": "Applying", "count": 3 }]
  }

OUTPUT FILES:
  01_Notes.pdf  02_Roadmap.pdf  03_Resources.pdf  04_QA.pdf
  Mentorix_Complete_Pack.zip

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  MENTORIX_LLM_PROVIDER   Provider used with MENTORIX_MODEL when --provider is unset
  PDFIUM_LIB_PATH         Directory holding libpdfium (PDF syllabi only)
  MENTORIX_*              Every flag, e.g. MENTORIX_MODE=combined
"#;

/// Generate a learning pack (notes, roadmap, resources, question paper) as PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "mentorix",
    version,
    about = "Generate a learning pack of PDFs from a topic or a syllabus using LLMs",
    long_about = "Generate a learning pack from a topic name or a syllabus (PDF, DOCX, TXT or \
URL): structured notes, a learning roadmap, important resources and a question paper with an \
answer key, each as an A4 PDF, plus a ZIP bundle. Scanned PDFs are read with Tesseract or a \
vision model.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Topic name, e.g. "DBMS".
    #[arg(long, env = "MENTORIX_TOPIC", conflicts_with = "syllabus",
          required_unless_present = "syllabus")]
    topic: Option<String>,

    /// Syllabus file (pdf, docx, txt) or HTTP/HTTPS URL.
    #[arg(long, env = "MENTORIX_SYLLABUS")]
    syllabus: Option<String>,

    /// Extra instructions appended to every prompt.
    #[arg(long, env = "MENTORIX_INSTRUCTIONS")]
    instructions: Option<String>,

    /// Question pattern COUNTxMARKS, repeatable (default 4x2).
    #[arg(long = "pattern", env = "MENTORIX_PATTERN", value_delimiter = ',')]
    patterns: Vec<QuestionPattern>,

    /// Teacher-framed question MARKS:TEXT, repeatable.
    #[arg(long = "custom", env = "MENTORIX_CUSTOM")]
    custom: Vec<CustomQuestion>,

    /// Bloom's taxonomy target LEVEL=COUNT, repeatable.
    #[arg(long = "bloom", env = "MENTORIX_BLOOM", value_delimiter = ',')]
    bloom: Vec<TaxonomyTarget>,

    /// JSON blueprint file. Flags above are added on top of it.
    #[arg(long, env = "MENTORIX_BLUEPRINT")]
    blueprint: Option<PathBuf>,

    /// One LLM call per section, or one combined call.
    #[arg(long, env = "MENTORIX_MODE", value_enum, default_value = "per-section")]
    mode: ModeArg,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "MENTORIX_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (default: gemini-2.5-flash).
    #[arg(long, env = "MENTORIX_MODEL")]
    model: Option<String>,

    /// OCR engine for scanned PDFs.
    #[arg(long, env = "MENTORIX_OCR", value_enum, default_value = "tesseract")]
    ocr: OcrArg,

    /// Tesseract language code(s), e.g. eng or eng+hin.
    #[arg(long, env = "MENTORIX_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// Output directory.
    #[arg(short, long, env = "MENTORIX_OUT", default_value = "mentorix_output")]
    out: PathBuf,

    /// Name of the ZIP bundle.
    #[arg(long, env = "MENTORIX_ZIP_NAME", default_value = DEFAULT_ARCHIVE_NAME)]
    zip_name: String,

    /// Do not write the ZIP bundle.
    #[arg(long, env = "MENTORIX_NO_ZIP")]
    no_zip: bool,

    /// Print the text of every section to stdout.
    #[arg(long, env = "MENTORIX_PREVIEW")]
    preview: bool,

    /// Print a JSON summary of the pack to stdout.
    #[arg(long, env = "MENTORIX_JSON")]
    json: bool,

    /// Print the text extracted from --syllabus and exit.
    #[arg(long, env = "MENTORIX_EXTRACT_ONLY", requires = "syllabus")]
    extract_only: bool,

    /// Retries per LLM call.
    #[arg(long, env = "MENTORIX_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "MENTORIX_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,

    /// Syllabus download timeout in seconds.
    #[arg(long, env = "MENTORIX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "MENTORIX_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "MENTORIX_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MENTORIX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MENTORIX_QUIET")]
    quiet: bool,

    /// Disable the progress bar.
    #[arg(long, env = "MENTORIX_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    PerSection,
    Combined,
}

impl From<ModeArg> for GenerationMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::PerSection => GenerationMode::PerSection,
            ModeArg::Combined => GenerationMode::Combined,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OcrArg {
    Tesseract,
    Vision,
    Off,
}

impl From<OcrArg> for OcrBackend {
    fn from(v: OcrArg) -> Self {
        match v {
            OcrArg::Tesseract => OcrBackend::Tesseract,
            OcrArg::Vision => OcrBackend::Vision,
            OcrArg::Off => OcrBackend::Disabled,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar carries the feedback; library INFO logs would tear it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.extract_only;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as ProgressCallback)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let input = cli.syllabus.as_deref().context("--extract-only needs --syllabus")?;
        let loaded = extract_syllabus(input, &config)
            .await
            .context("Failed to extract syllabus")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&loaded.extracted)
                    .context("Failed to serialise extracted text")?
            );
        } else {
            println!("{}", loaded.extracted.text);
            if !cli.quiet {
                eprintln!(
                    "{} {} chars from {} ({:?}, {} pages)",
                    dim("ℹ"),
                    loaded.extracted.text.chars().count(),
                    loaded.source_name,
                    loaded.extracted.method,
                    loaded.extracted.pages,
                );
            }
        }
        return Ok(());
    }

    // ── Build request ────────────────────────────────────────────────────
    let blueprint = build_blueprint(&cli).await?;
    let mut request = match (&cli.topic, &cli.syllabus) {
        (_, Some(input)) => {
            let loaded = extract_syllabus(input, &config)
                .await
                .context("Failed to extract syllabus")?;
            PackRequest::new(loaded.into_subject())
        }
        (Some(topic), None) => PackRequest::topic(topic.clone()),
        (None, None) => bail!("Either --topic or --syllabus is required"),
    };
    request = request.with_blueprint(blueprint);
    if let Some(ref extra) = cli.instructions {
        request = request.with_instructions(extra.clone());
    }

    // ── Generate and write ───────────────────────────────────────────────
    let pack = generate_pack(&request, &config)
        .await
        .context("Pack generation failed")?;

    let zip_name = (!cli.no_zip).then_some(cli.zip_name.as_str());
    let written = write_pack(&pack, &cli.out, zip_name)
        .await
        .with_context(|| format!("Failed to write pack to {}", cli.out.display()))?;

    if cli.preview {
        print_preview(&pack)?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&pack).context("Failed to serialise pack")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&pack, &written, show_progress);
    }

    Ok(())
}

/// Map CLI args to `PackConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PackConfig> {
    let mut builder = PackConfig::builder()
        .mode(cli.mode.into())
        .ocr(cli.ocr.into())
        .ocr_language(cli.ocr_lang.clone())
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Blueprint file (if any) with the flag-supplied parts layered on top.
async fn build_blueprint(cli: &Cli) -> Result<QuestionBlueprint> {
    let mut blueprint = match cli.blueprint {
        Some(ref path) => {
            let json = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read blueprint from {:?}", path))?;
            QuestionBlueprint::from_json_str(&json)?
        }
        None => QuestionBlueprint::default(),
    };

    if !cli.patterns.is_empty() {
        blueprint.patterns = cli.patterns.clone();
    }
    blueprint.custom.extend(cli.custom.iter().cloned());
    blueprint.taxonomy.extend(cli.bloom.iter().copied());
    Ok(blueprint)
}

fn print_preview(pack: &LearningPack) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    for artifact in &pack.artifacts {
        writeln!(handle, "===== {} ({}) =====", artifact.title, artifact.file_name())
            .and_then(|_| writeln!(handle, "{}\n", artifact.content.trim_end()))
            .context("Failed to write to stdout")?;
    }
    Ok(())
}

fn print_summary(pack: &LearningPack, written: &[PathBuf], progress_shown: bool) {
    if !progress_shown {
        for section in &pack.sections {
            match section.error {
                None => eprintln!("  {} {}", green("✓"), section.kind.title()),
                Some(ref e) => eprintln!("  {} {}", red("✗"), e),
            }
        }
    }
    for path in written {
        eprintln!("  {} {}", dim("→"), bold(&path.display().to_string()));
    }
    let stats = &pack.stats;
    eprintln!(
        "   {} tokens in  /  {} tokens out  ·  {}ms total",
        dim(&stats.total_input_tokens.to_string()),
        dim(&stats.total_output_tokens.to_string()),
        stats.total_duration_ms,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeatable_blueprint_flags() {
        let cli = Cli::try_parse_from([
            "mentorix",
            "--topic",
            "DBMS",
            "--pattern",
            "4x2",
            "--pattern",
            "2x10",
            "--custom",
            "5:Explain normalization.",
            "--bloom",
            "Applying=3",
        ])
        .unwrap();
        assert_eq!(cli.patterns.len(), 2);
        assert_eq!(cli.patterns[1], QuestionPattern { count: 2, marks: 10 });
        assert_eq!(cli.custom[0].marks, 5);
        assert_eq!(cli.bloom[0].count, 3);
    }

    #[test]
    fn topic_and_syllabus_conflict() {
        let err = Cli::try_parse_from(["mentorix", "--topic", "A", "--syllabus", "b.txt"]);
        assert!(err.is_err());
    }

    #[test]
    fn extract_only_requires_syllabus() {
        assert!(Cli::try_parse_from(["mentorix", "--topic", "A", "--extract-only"]).is_err());
        assert!(Cli::try_parse_from(["mentorix", "--syllabus", "s.txt", "--extract-only"]).is_ok());
    }

    #[tokio::test]
    async fn flag_patterns_replace_default_menu() {
        let cli = Cli::try_parse_from(["mentorix", "--topic", "A", "--pattern", "3x5"]).unwrap();
        let bp = build_blueprint(&cli).await.unwrap();
        assert_eq!(bp.patterns, vec![QuestionPattern { count: 3, marks: 5 }]);

        let cli = Cli::try_parse_from(["mentorix", "--topic", "A"]).unwrap();
        let bp = build_blueprint(&cli).await.unwrap();
        assert_eq!(bp, QuestionBlueprint::default());
    }

    #[test]
    fn config_from_flags() {
        let cli = Cli::try_parse_from([
            "mentorix", "--topic", "A", "--mode", "combined", "--ocr", "off", "--max-retries", "1",
        ])
        .unwrap();
        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.mode, GenerationMode::Combined);
        assert_eq!(config.ocr, OcrBackend::Disabled);
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn download_timeout_flag_reaches_config() {
        let cli = Cli::try_parse_from(["mentorix", "--topic", "A"]).unwrap();
        assert_eq!(build_config(&cli, None).unwrap().download_timeout_secs, 120);

        let cli =
            Cli::try_parse_from(["mentorix", "--topic", "A", "--download-timeout", "30"]).unwrap();
        assert_eq!(build_config(&cli, None).unwrap().download_timeout_secs, 30);
    }

    #[test]
    fn every_flag_has_an_env_var() {
        use clap::CommandFactory;
        let cmd = Cli::command();
        for arg in cmd.get_arguments() {
            let id = arg.get_id().as_str();
            if matches!(id, "help" | "version") {
                continue;
            }
            assert!(arg.get_env().is_some(), "--{id} has no MENTORIX_* env var");
        }
        let extract_only = cmd
            .get_arguments()
            .find(|a| a.get_id() == "extract_only")
            .unwrap();
        assert_eq!(extract_only.get_env().unwrap(), "MENTORIX_EXTRACT_ONLY");
    }
}
