//! Pack generation entry points.
//!
//! ```text
//! syllabus ─▶ extract_syllabus ─┐
//!                               ├─▶ generate_pack ─▶ LearningPack ─▶ write_pack
//! topic ────────────────────────┘    (LLM, split, render)              (PDFs + ZIP)
//! ```
//!
//! [`generate_pack`] returns `Ok` even when some sections failed; check
//! [`LearningPack::failed_sections`]. It only errors when nothing could be
//! produced at all.

use crate::blueprint::{QuestionBlueprint, TaxonomyCheck};
use crate::config::{GenerationMode, PackConfig};
use crate::error::{MentorixError, SectionError};
use crate::output::{Artifact, LearningPack, PackStats, SectionKind, SectionResult};
use crate::pipeline::archive::bundle_zip;
use crate::pipeline::extract::{extract_text, ExtractedText};
use crate::pipeline::input::resolve_source;
use crate::pipeline::llm::{
    generate_with_retry, resolve_generator, validate_response, GenerationRequest, TextGenerator,
};
use crate::pipeline::render::render_pdf;
use crate::pipeline::segment::{
    assemble_question_paper, split_question_bank, split_sections, tidy_response,
};
use crate::progress::Stage;
use crate::prompts::{
    master_prompt, notes_prompt, question_bank_prompt, resources_prompt, roadmap_prompt, Subject,
};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Everything needed to ask for a pack.
#[derive(Debug, Clone)]
pub struct PackRequest {
    pub subject: Subject,
    /// Free-form extra instructions appended to every prompt.
    pub instructions: Option<String>,
    pub blueprint: QuestionBlueprint,
}

impl PackRequest {
    pub fn topic(topic: impl Into<String>) -> Self {
        Self::new(Subject::Topic(topic.into()))
    }

    pub fn new(subject: Subject) -> Self {
        Self {
            subject,
            instructions: None,
            blueprint: QuestionBlueprint::default(),
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_blueprint(mut self, blueprint: QuestionBlueprint) -> Self {
        self.blueprint = blueprint;
        self
    }

    fn validate(&self) -> Result<(), MentorixError> {
        match &self.subject {
            Subject::Topic(t) if t.trim().is_empty() => {
                Err(MentorixError::InvalidInput("topic is empty".into()))
            }
            Subject::Syllabus { text, .. } if text.trim().is_empty() => {
                Err(MentorixError::InvalidInput("syllabus text is empty".into()))
            }
            _ => Ok(()),
        }
    }
}

/// A syllabus read from disk or the web.
#[derive(Debug, Clone)]
pub struct LoadedSyllabus {
    pub source_name: String,
    pub extracted: ExtractedText,
}

impl LoadedSyllabus {
    pub fn into_subject(self) -> Subject {
        Subject::Syllabus {
            text: self.extracted.text,
            source_name: self.source_name,
        }
    }
}

/// Resolve `input` (path or URL), sniff its format and extract its text.
///
/// Does not need an LLM unless the syllabus is a scanned PDF and
/// `config.ocr` is [`crate::config::OcrBackend::Vision`].
pub async fn extract_syllabus(
    input: &str,
    config: &PackConfig,
) -> Result<LoadedSyllabus, MentorixError> {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::Extracting, 1);
    }
    let doc = resolve_source(input, config.download_timeout_secs).await?;
    let extracted = extract_text(&doc, config).await?;
    Ok(LoadedSyllabus {
        source_name: doc.name,
        extracted,
    })
}

/// Generate, split and render a learning pack.
///
/// # Errors
/// Only fatal problems are errors:
/// - blank topic or syllabus, or an impossible blueprint
/// - no LLM provider could be resolved
/// - every section failed
/// - a PDF could not be rendered
pub async fn generate_pack(
    request: &PackRequest,
    config: &PackConfig,
) -> Result<LearningPack, MentorixError> {
    let total_start = Instant::now();
    request.validate()?;

    if let TaxonomyCheck::Short {
        requested,
        available,
    } = request.blueprint.validate()?
    {
        warn!(
            "Taxonomy distribution covers {} of {} pattern questions; the rest will be mixed",
            requested, available
        );
    }

    let generator = resolve_generator(config)?;
    let with_questions = request.blueprint.total_questions() > 0;
    let kinds: Vec<SectionKind> = SectionKind::ALL
        .into_iter()
        .filter(|k| with_questions || *k != SectionKind::QuestionBank)
        .collect();

    info!(
        "Generating pack for '{}' ({:?}, {} sections)",
        request.subject.label(),
        config.mode,
        kinds.len()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::Generating, kinds.len());
    }

    // ── Generate ─────────────────────────────────────────────────────────
    let llm_start = Instant::now();
    let sections = match config.mode {
        GenerationMode::PerSection => {
            generate_per_section(generator.as_ref(), request, &kinds, config).await
        }
        GenerationMode::Combined => {
            generate_combined(generator.as_ref(), request, &kinds, config).await
        }
    };
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    let failed = sections.iter().filter(|s| !s.is_ok()).count();
    if failed == sections.len() {
        let first_error = sections
            .iter()
            .find_map(|s| s.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(MentorixError::AllSectionsFailed {
            total: sections.len(),
            first_error,
        });
    }

    // ── Segment ──────────────────────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::Segmenting, 1);
    }
    let question_bank = sections
        .iter()
        .find(|s| s.kind == SectionKind::QuestionBank && s.is_ok())
        .map(|s| split_question_bank(&s.content));

    // ── Render ───────────────────────────────────────────────────────────
    let render_start = Instant::now();
    let ok_sections: Vec<&SectionResult> = sections.iter().filter(|s| s.is_ok()).collect();
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage_start(Stage::Rendering, ok_sections.len());
    }

    let mut artifacts = Vec::with_capacity(ok_sections.len());
    for section in ok_sections {
        let content = match (section.kind, question_bank.as_ref()) {
            (SectionKind::QuestionBank, Some(bank)) => {
                assemble_question_paper(&request.blueprint.question_paper_preamble(), bank)
            }
            _ => section.content.clone(),
        };
        let artifact = render_artifact(section.kind, content).await?;
        if let Some(ref cb) = config.progress_callback {
            cb.on_artifact_rendered(&artifact.name, artifact.pdf.len());
        }
        artifacts.push(artifact);
    }
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    let stats = PackStats {
        sections_requested: sections.len(),
        sections_failed: failed,
        total_input_tokens: sections.iter().map(|s| s.input_tokens as u64).sum(),
        total_output_tokens: sections.iter().map(|s| s.output_tokens as u64).sum(),
        llm_duration_ms,
        render_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Pack complete: {} artifacts, {}/{} sections failed, {}ms total",
        artifacts.len(),
        failed,
        sections.len(),
        stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_pack_complete(artifacts.len(), failed);
    }

    Ok(LearningPack {
        subject: request.subject.label().to_string(),
        artifacts,
        sections,
        question_bank,
        stats,
    })
}

/// Synchronous wrapper around [`generate_pack`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_pack_sync(
    request: &PackRequest,
    config: &PackConfig,
) -> Result<LearningPack, MentorixError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| MentorixError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_pack(request, config))
}

/// Write every artifact as `{name}.pdf` into `dir`, plus the ZIP bundle when
/// `zip_name` is given. Returns the written paths.
///
/// Uses atomic writes (temp file + rename) so a crash never leaves a
/// half-written PDF behind.
pub async fn write_pack(
    pack: &LearningPack,
    dir: impl AsRef<Path>,
    zip_name: Option<&str>,
) -> Result<Vec<PathBuf>, MentorixError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| MentorixError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

    let mut written = Vec::with_capacity(pack.artifacts.len() + 1);
    for artifact in &pack.artifacts {
        let path = dir.join(artifact.file_name());
        write_atomic(&path, &artifact.pdf).await?;
        written.push(path);
    }

    if let Some(name) = zip_name {
        let bytes = bundle_zip(&pack.artifacts)?;
        let path = dir.join(name);
        write_atomic(&path, &bytes).await?;
        written.push(path);
    }

    debug!("Wrote {} files to {}", written.len(), dir.display());
    Ok(written)
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn section_prompt(kind: SectionKind, request: &PackRequest) -> String {
    let instructions = request.instructions.as_deref();
    match kind {
        SectionKind::Notes => notes_prompt(&request.subject, instructions),
        SectionKind::Roadmap => roadmap_prompt(&request.subject, instructions),
        SectionKind::Resources => resources_prompt(&request.subject, instructions),
        SectionKind::QuestionBank => {
            question_bank_prompt(&request.subject, instructions, &request.blueprint)
        }
    }
}

/// One prompt per section, run concurrently. Results come back in
/// artifact order.
async fn generate_per_section(
    generator: &dyn TextGenerator,
    request: &PackRequest,
    kinds: &[SectionKind],
    config: &PackConfig,
) -> Vec<SectionResult> {
    let mut results: Vec<SectionResult> = stream::iter(kinds.iter().map(|&kind| {
        let prompt = section_prompt(kind, request);
        async move { run_section(generator, kind, prompt, config).await }
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await;

    results.sort_by_key(|r| r.kind);
    results
}

async fn run_section(
    generator: &dyn TextGenerator,
    kind: SectionKind,
    prompt: String,
    config: &PackConfig,
) -> SectionResult {
    if let Some(ref cb) = config.progress_callback {
        cb.on_section_start(kind);
    }

    let label = kind.to_string();
    let request = GenerationRequest::text(prompt);
    let mut result = SectionResult {
        kind,
        content: String::new(),
        input_tokens: 0,
        output_tokens: 0,
        duration_ms: 0,
        retries: 0,
        error: None,
    };

    match generate_with_retry(generator, &label, &request, config).await {
        Ok(attempted) => {
            result.input_tokens = attempted.generation.input_tokens;
            result.output_tokens = attempted.generation.output_tokens;
            result.duration_ms = attempted.duration_ms;
            result.retries = attempted.retries;

            let text = tidy_response(&attempted.generation.text);
            match validate_response(&text, config.min_response_chars) {
                Ok(()) => result.content = text,
                Err(e) => {
                    result.error = Some(SectionError::Rejected {
                        section: label,
                        detail: e.to_string(),
                    })
                }
            }
        }
        Err(e) => {
            result.retries = retries_spent(&e, config);
            result.error = Some(SectionError::LlmFailed {
                section: label,
                retries: result.retries,
                detail: e.to_string(),
            });
        }
    }

    report_section(&result, config);
    result
}

/// One master prompt whose answer is split into sections by heading.
async fn generate_combined(
    generator: &dyn TextGenerator,
    request: &PackRequest,
    kinds: &[SectionKind],
    config: &PackConfig,
) -> Vec<SectionResult> {
    if let Some(ref cb) = config.progress_callback {
        for &kind in kinds {
            cb.on_section_start(kind);
        }
    }

    let prompt = master_prompt(
        &request.subject,
        request.instructions.as_deref(),
        &request.blueprint,
    );
    let outcome = match generate_with_retry(generator, "pack", &GenerationRequest::text(prompt), config)
        .await
    {
        Ok(attempted) => {
            let text = tidy_response(&attempted.generation.text);
            match validate_response(&text, config.min_response_chars) {
                Ok(()) => Ok((attempted, text)),
                Err(e) => Err(SectionError::Rejected {
                    section: "pack".into(),
                    detail: e.to_string(),
                }),
            }
        }
        Err(e) => Err(SectionError::LlmFailed {
            section: "pack".into(),
            retries: retries_spent(&e, config),
            detail: e.to_string(),
        }),
    };

    let results: Vec<SectionResult> = match outcome {
        Ok((attempted, text)) => {
            let split = split_sections(&text);
            kinds
                .iter()
                .map(|&kind| {
                    let content = match kind {
                        SectionKind::Notes => split.notes.clone(),
                        SectionKind::Roadmap => split.roadmap.clone(),
                        SectionKind::Resources => split.resources.clone(),
                        SectionKind::QuestionBank if split.qbank.is_empty() => text.clone(),
                        SectionKind::QuestionBank => split.qbank.clone(),
                    };
                    // Tokens are booked once, against the first section.
                    let first = kind == SectionKind::Notes;
                    SectionResult {
                        kind,
                        content,
                        input_tokens: if first { attempted.generation.input_tokens } else { 0 },
                        output_tokens: if first { attempted.generation.output_tokens } else { 0 },
                        duration_ms: attempted.duration_ms,
                        retries: attempted.retries,
                        error: None,
                    }
                })
                .collect()
        }
        Err(error) => kinds
            .iter()
            .map(|&kind| SectionResult {
                kind,
                content: String::new(),
                input_tokens: 0,
                output_tokens: 0,
                duration_ms: 0,
                retries: match &error {
                    SectionError::LlmFailed { retries, .. } => *retries,
                    SectionError::Rejected { .. } => 0,
                },
                error: Some(error.clone()),
            })
            .collect(),
    };

    for result in &results {
        report_section(result, config);
    }
    results
}

/// Auth failures are never retried.
fn retries_spent(error: &MentorixError, config: &PackConfig) -> u32 {
    match error {
        MentorixError::AuthError { .. } => 0,
        _ => config.max_retries,
    }
}

fn report_section(result: &SectionResult, config: &PackConfig) {
    match &result.error {
        None => {
            debug!("{}: {} chars", result.kind, result.content.len());
            if let Some(ref cb) = config.progress_callback {
                cb.on_section_complete(result.kind, result.content.chars().count());
            }
        }
        Some(e) => {
            warn!("{}", e);
            if let Some(ref cb) = config.progress_callback {
                cb.on_section_error(result.kind, &e.to_string());
            }
        }
    }
}

/// Lay out and write one PDF off the async runtime.
async fn render_artifact(kind: SectionKind, content: String) -> Result<Artifact, MentorixError> {
    let title = kind.title();
    let (content, pdf) = tokio::task::spawn_blocking(move || {
        let pdf = render_pdf(title, &content)?;
        Ok::<_, MentorixError>((content, pdf))
    })
    .await
    .map_err(|e| MentorixError::Internal(format!("Render task panicked: {}", e)))??;

    Ok(Artifact {
        kind,
        name: kind.artifact_name().to_string(),
        title: title.to_string(),
        content,
        pdf,
    })
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), MentorixError> {
    let write_err = |e: std::io::Error| MentorixError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_topic_is_rejected() {
        let err = PackRequest::topic("   ").validate().unwrap_err();
        assert!(matches!(err, MentorixError::InvalidInput(_)));
    }

    #[test]
    fn blank_syllabus_is_rejected() {
        let request = PackRequest::new(Subject::Syllabus {
            text: "\n".into(),
            source_name: "s.txt".into(),
        });
        assert!(request.validate().is_err());
    }

    #[test]
    fn section_prompts_follow_kind() {
        let request = PackRequest::topic("Graph Theory").with_instructions("Focus on trees");
        let notes = section_prompt(SectionKind::Notes, &request);
        assert!(notes.contains("structured notes for Graph Theory"));
        assert!(notes.contains("Focus on trees"));
        let qa = section_prompt(SectionKind::QuestionBank, &request);
        assert!(qa.contains("SECTION 1: QUESTIONS ONLY (FOR STUDENTS)"));
    }

    #[test]
    fn auth_errors_spend_no_retries() {
        let config = PackConfig::default();
        let auth = MentorixError::AuthError { detail: "401".into() };
        assert_eq!(retries_spent(&auth, &config), 0);
        let api = MentorixError::LlmApiError { message: "503".into() };
        assert_eq!(retries_spent(&api, &config), config.max_retries);
    }

    #[tokio::test]
    async fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("01_Notes.pdf");
        write_atomic(&path, b"%PDF").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF");
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }
}
