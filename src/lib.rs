//! # mentorix
//!
//! Turn a topic name or an uploaded syllabus into a ready-to-print learning
//! pack: structured notes, a learning roadmap, a resource list and a
//! question paper with its answer key, each as an A4 PDF, plus a ZIP bundle.
//!
//! ## Pipeline Overview
//!
//! ```text
//! topic / syllabus (pdf, docx, txt, URL)
//!  │
//!  ├─ 1. Input    resolve a local file or download from a URL
//!  ├─ 2. Extract  text layer via pdfium, DOCX via zip + quick-xml, OCR fallback
//!  ├─ 3. LLM      four section prompts (or one master prompt), with retries
//!  ├─ 4. Segment  split the question bank into paper and answer key
//!  ├─ 5. Render   one PDF per section (lopdf, Helvetica, WinAnsi)
//!  └─ 6. Archive  Mentorix_Complete_Pack.zip
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mentorix::{generate_pack, write_pack, PackConfig, PackRequest, DEFAULT_ARCHIVE_NAME};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / ...
//!     let config = PackConfig::default();
//!     let request = PackRequest::topic("DBMS").with_instructions("Focus on normalization");
//!     let pack = generate_pack(&request, &config).await?;
//!     for failed in pack.failed_sections() {
//!         eprintln!("skipped: {:?}", failed.error);
//!     }
//!     write_pack(&pack, "out", Some(DEFAULT_ARCHIVE_NAME)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mentorix` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! mentorix = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod blueprint;
pub mod config;
pub mod error;
pub mod output;
pub mod pack;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use blueprint::{
    detect_bloom_level, BloomLevel, CustomQuestion, QuestionBlueprint, QuestionPattern,
    TaxonomyCheck, TaxonomyTarget,
};
pub use config::{GenerationMode, OcrBackend, PackConfig, PackConfigBuilder};
pub use error::{MentorixError, SectionError};
pub use output::{Artifact, LearningPack, PackStats, QuestionBank, SectionKind, SectionResult};
pub use pack::{
    extract_syllabus, generate_pack, generate_pack_sync, write_pack, LoadedSyllabus, PackRequest,
};
pub use pipeline::archive::DEFAULT_ARCHIVE_NAME;
pub use pipeline::extract::{ExtractedText, ExtractionMethod};
pub use pipeline::llm::{Generation, GenerationRequest, TextGenerator};
pub use progress::{NoopProgressCallback, PackProgressCallback, ProgressCallback, Stage};
pub use prompts::Subject;
