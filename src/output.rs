//! Result types returned by the pack pipeline.

use crate::error::SectionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The four parts of a learning pack, in artifact order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectionKind {
    Notes,
    Roadmap,
    Resources,
    QuestionBank,
}

impl SectionKind {
    pub const ALL: [SectionKind; 4] = [
        SectionKind::Notes,
        SectionKind::Roadmap,
        SectionKind::Resources,
        SectionKind::QuestionBank,
    ];

    /// File stem of the rendered PDF, e.g. `01_Notes`.
    pub fn artifact_name(&self) -> &'static str {
        match self {
            SectionKind::Notes => "01_Notes",
            SectionKind::Roadmap => "02_Roadmap",
            SectionKind::Resources => "03_Resources",
            SectionKind::QuestionBank => "04_QA",
        }
    }

    /// Title printed in the header of every page.
    pub fn title(&self) -> &'static str {
        match self {
            SectionKind::Notes => "Structured Notes",
            SectionKind::Roadmap => "Learning Roadmap",
            SectionKind::Resources => "Important Resources",
            SectionKind::QuestionBank => "Question Bank",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SectionKind::Notes => "notes",
            SectionKind::Roadmap => "roadmap",
            SectionKind::Resources => "resources",
            SectionKind::QuestionBank => "qbank",
        })
    }
}

/// Outcome of generating one section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionResult {
    pub kind: SectionKind,
    /// Section text; empty when `error` is set.
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    /// Retries used (0 = first attempt succeeded).
    pub retries: u32,
    pub error: Option<SectionError>,
}

impl SectionResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// A question bank split into the student paper and the answer key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionBank {
    pub questions: String,
    pub answers: String,
}

/// One downloadable PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: SectionKind,
    /// File stem, e.g. `01_Notes`.
    pub name: String,
    pub title: String,
    /// Text the PDF was rendered from (used for previews).
    pub content: String,
    #[serde(skip)]
    pub pdf: Vec<u8>,
}

impl Artifact {
    pub fn file_name(&self) -> String {
        format!("{}.pdf", self.name)
    }
}

/// Aggregate numbers for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackStats {
    pub sections_requested: usize,
    pub sections_failed: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub llm_duration_ms: u64,
    pub render_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// The full result of [`crate::pack::generate_pack`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPack {
    /// Topic name or syllabus source.
    pub subject: String,
    pub artifacts: Vec<Artifact>,
    pub sections: Vec<SectionResult>,
    /// Present when a question bank was generated.
    pub question_bank: Option<QuestionBank>,
    pub stats: PackStats,
}

impl LearningPack {
    pub fn artifact(&self, kind: SectionKind) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    pub fn failed_sections(&self) -> impl Iterator<Item = &SectionResult> {
        self.sections.iter().filter(|s| !s.is_ok())
    }
}
