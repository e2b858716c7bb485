//! Question-paper blueprint: how many questions, worth how many marks, at
//! which Bloom's taxonomy level.
//!
//! A blueprint has three parts:
//!
//! * **Pattern menu**: rows of `count × marks` the model generates freely.
//! * **Custom questions**: teacher-framed questions that must appear
//!   verbatim, each with its own marks and (auto-detected) Bloom level.
//! * **Taxonomy targets**: an optional split of the *pattern* questions
//!   across Bloom levels. Custom questions never count towards it.
//!
//! Everything here is pure string building; the prompts in
//! [`crate::prompts`] and the question-paper preamble embed the rendered
//! instructions verbatim.

use crate::error::MentorixError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Upper bound on the questions in one paper.
pub const MAX_QUESTIONS: u32 = 200;

/// Horizontal rule used around question-paper headings.
pub const RULE: &str = "═══════════════════════════════════════";

// ── Bloom levels ─────────────────────────────────────────────────────────

/// The six cognitive levels of the revised Bloom's taxonomy, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum BloomLevel {
    Remembering,
    #[default]
    Understanding,
    Applying,
    Analyzing,
    Evaluating,
    Creating,
}

impl BloomLevel {
    /// All levels in taxonomy order.
    pub const ALL: [BloomLevel; 6] = [
        BloomLevel::Remembering,
        BloomLevel::Understanding,
        BloomLevel::Applying,
        BloomLevel::Analyzing,
        BloomLevel::Evaluating,
        BloomLevel::Creating,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloomLevel::Remembering => "Remembering",
            BloomLevel::Understanding => "Understanding",
            BloomLevel::Applying => "Applying",
            BloomLevel::Analyzing => "Analyzing",
            BloomLevel::Evaluating => "Evaluating",
            BloomLevel::Creating => "Creating",
        }
    }

    /// Verbs and phrases that typically open a question at this level.
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            BloomLevel::Remembering => &[
                "define", "list", "name", "state", "identify", "recall", "what is", "mention",
            ],
            BloomLevel::Understanding => &[
                "explain", "summarize", "describe", "differentiate", "classify", "interpret",
                "outline",
            ],
            BloomLevel::Applying => &[
                "apply", "solve", "use", "demonstrate", "calculate", "implement", "show how",
            ],
            BloomLevel::Analyzing => &[
                "analyze", "compare", "contrast", "examine", "categorize", "investigate", "why",
            ],
            BloomLevel::Evaluating => &[
                "evaluate", "justify", "critique", "assess", "argue", "recommend", "validate",
            ],
            BloomLevel::Creating => &[
                "design", "create", "develop", "construct", "propose", "formulate", "build",
            ],
        }
    }
}

impl fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloomLevel {
    type Err = MentorixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        BloomLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                MentorixError::InvalidConfig(format!(
                    "unknown Bloom level '{wanted}' (expected one of: {})",
                    BloomLevel::ALL.map(|l| l.as_str()).join(", ")
                ))
            })
    }
}

/// Guess the Bloom level of a question from its wording.
///
/// A keyword the question *starts with* scores 3, a keyword found anywhere
/// else scores 1. The highest-scoring level wins; ties go to the lower
/// level. Returns `None` for blank text and `Understanding` when no keyword
/// matches at all.
pub fn detect_bloom_level(question: &str) -> Option<BloomLevel> {
    let text = question.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }

    let mut best = (BloomLevel::Understanding, 0u32);
    for level in BloomLevel::ALL {
        let score: u32 = level
            .keywords()
            .iter()
            .map(|kw| {
                if text.starts_with(kw) {
                    3
                } else if text.contains(kw) {
                    1
                } else {
                    0
                }
            })
            .sum();
        if score > best.1 {
            best = (level, score);
        }
    }
    Some(best.0)
}

// ── Blueprint parts ──────────────────────────────────────────────────────

/// One row of the pattern menu: `count` questions worth `marks` each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionPattern {
    pub count: u32,
    pub marks: u32,
}

impl FromStr for QuestionPattern {
    type Err = MentorixError;

    /// Parses `COUNTxMARKS`, e.g. `4x2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || MentorixError::InvalidConfig(format!("pattern '{s}' must look like COUNTxMARKS, e.g. 4x2"));
        let (count, marks) = s.trim().to_lowercase().split_once('x').map(|(c, m)| {
            (c.trim().parse::<u32>(), m.trim().parse::<u32>())
        }).ok_or_else(bad)?;
        Ok(Self {
            count: count.map_err(|_| bad())?,
            marks: marks.map_err(|_| bad())?,
        })
    }
}

/// A teacher-framed question that must appear in the paper verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomQuestion {
    pub text: String,
    #[serde(default = "default_custom_marks")]
    pub marks: u32,
    /// Explicit level; detected from the text when absent.
    #[serde(default)]
    pub bloom_level: Option<BloomLevel>,
}

fn default_custom_marks() -> u32 {
    2
}

impl CustomQuestion {
    pub fn new(text: impl Into<String>, marks: u32) -> Self {
        Self {
            text: text.into(),
            marks,
            bloom_level: None,
        }
    }

    /// The explicit level, else the detected one, else `Understanding`.
    pub fn level(&self) -> BloomLevel {
        self.bloom_level
            .or_else(|| detect_bloom_level(&self.text))
            .unwrap_or_default()
    }
}

impl FromStr for CustomQuestion {
    type Err = MentorixError;

    /// Parses `MARKS:TEXT`, e.g. `5:Explain normalization with examples.`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (marks, text) = s.split_once(':').ok_or_else(|| {
            MentorixError::InvalidConfig(format!("custom question '{s}' must look like MARKS:TEXT"))
        })?;
        let marks = marks.trim().parse::<u32>().map_err(|_| {
            MentorixError::InvalidConfig(format!("custom question marks '{}' is not a number", marks.trim()))
        })?;
        Ok(Self::new(text.trim(), marks))
    }
}

/// `count` pattern questions at `level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyTarget {
    pub level: BloomLevel,
    pub count: u32,
}

impl FromStr for TaxonomyTarget {
    type Err = MentorixError;

    /// Parses `LEVEL=COUNT`, e.g. `Applying=3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (level, count) = s.split_once('=').ok_or_else(|| {
            MentorixError::InvalidConfig(format!("taxonomy target '{s}' must look like LEVEL=COUNT"))
        })?;
        Ok(Self {
            level: level.parse()?,
            count: count.trim().parse().map_err(|_| {
                MentorixError::InvalidConfig(format!("taxonomy count '{}' is not a number", count.trim()))
            })?,
        })
    }
}

/// Outcome of comparing the taxonomy targets with the pattern menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaxonomyCheck {
    /// No targets, or no pattern questions to distribute.
    Unspecified,
    /// Targets ask for more questions than the pattern menu has.
    Exceeds { requested: u32, available: u32 },
    /// Targets cover only part of the menu; the rest are mixed.
    Short { requested: u32, available: u32 },
    Matches,
}

// ── Blueprint ────────────────────────────────────────────────────────────

/// The full question-paper specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionBlueprint {
    pub patterns: Vec<QuestionPattern>,
    pub custom: Vec<CustomQuestion>,
    pub taxonomy: Vec<TaxonomyTarget>,
}

impl Default for QuestionBlueprint {
    fn default() -> Self {
        Self {
            patterns: vec![QuestionPattern { count: 4, marks: 2 }],
            custom: Vec::new(),
            taxonomy: Vec::new(),
        }
    }
}

impl QuestionBlueprint {
    /// Parse a blueprint from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, MentorixError> {
        serde_json::from_str(json)
            .map_err(|e| MentorixError::InvalidConfig(format!("blueprint JSON: {e}")))
    }

    /// Custom questions with non-blank text.
    pub fn active_custom(&self) -> impl Iterator<Item = &CustomQuestion> {
        self.custom.iter().filter(|q| !q.text.trim().is_empty())
    }

    /// Questions coming from the pattern menu.
    pub fn generated_count(&self) -> u32 {
        self.patterns
            .iter()
            .fold(0u32, |acc, p| acc.saturating_add(p.count))
    }

    pub fn custom_count(&self) -> u32 {
        self.active_custom().count() as u32
    }

    pub fn total_questions(&self) -> u32 {
        self.generated_count().saturating_add(self.custom_count())
    }

    /// Number of questions per mark value, pattern and custom combined.
    pub fn marks_map(&self) -> BTreeMap<u32, u32> {
        let mut map = BTreeMap::new();
        for p in &self.patterns {
            let count = map.entry(p.marks).or_insert(0u32);
            *count = count.saturating_add(p.count);
        }
        for q in self.active_custom() {
            let count = map.entry(q.marks).or_insert(0u32);
            *count = count.saturating_add(1);
        }
        map.retain(|_, count| *count > 0);
        map
    }

    /// `- N questions of M marks each` lines, lowest marks first.
    pub fn mark_distribution(&self) -> String {
        self.marks_map()
            .iter()
            .map(|(marks, count)| format!("- {count} questions of {marks} marks each"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn taxonomy_instruction(&self) -> String {
        if self.taxonomy.is_empty() {
            return "No specific Bloom's Taxonomy distribution specified for pattern questions. \
                    Mix all levels for pattern questions."
                .to_string();
        }
        let lines: Vec<String> = self
            .taxonomy
            .iter()
            .map(|t| format!("- {} pattern questions at {} level", t.count, t.level))
            .collect();
        format!("FOR PATTERN MENU QUESTIONS ONLY:\n{}", lines.join("\n"))
    }

    pub fn custom_questions_instruction(&self) -> String {
        let lines: Vec<String> = self
            .active_custom()
            .map(|q| format!("- ({} Marks) [Bloom's Level: {}] {}", q.marks, q.level(), q.text.trim()))
            .collect();
        if lines.is_empty() {
            "No custom teacher-framed questions provided.".to_string()
        } else {
            lines.join("\n")
        }
    }

    pub fn check_taxonomy(&self) -> TaxonomyCheck {
        let available = self.generated_count();
        if self.taxonomy.is_empty() || available == 0 {
            return TaxonomyCheck::Unspecified;
        }
        let requested = self
            .taxonomy
            .iter()
            .fold(0u32, |acc, t| acc.saturating_add(t.count));
        match requested.cmp(&available) {
            std::cmp::Ordering::Greater => TaxonomyCheck::Exceeds { requested, available },
            std::cmp::Ordering::Less => TaxonomyCheck::Short { requested, available },
            std::cmp::Ordering::Equal => TaxonomyCheck::Matches,
        }
    }

    /// Reject blueprints the model cannot possibly satisfy.
    pub fn validate(&self) -> Result<TaxonomyCheck, MentorixError> {
        if let Some(p) = self.patterns.iter().find(|p| p.marks == 0) {
            return Err(MentorixError::InvalidConfig(format!(
                "pattern with {} questions has 0 marks; marks must be ≥ 1",
                p.count
            )));
        }
        if let Some(q) = self.active_custom().find(|q| q.marks == 0) {
            return Err(MentorixError::InvalidConfig(format!(
                "custom question '{}' has 0 marks; marks must be ≥ 1",
                q.text.trim()
            )));
        }
        if let Some(t) = self.taxonomy.iter().find(|t| t.count == 0) {
            return Err(MentorixError::InvalidConfig(format!(
                "taxonomy target for {} has count 0; count must be ≥ 1",
                t.level
            )));
        }
        let total = self.total_questions();
        if total > MAX_QUESTIONS {
            return Err(MentorixError::InvalidConfig(format!(
                "blueprint asks for {total} questions; at most {MAX_QUESTIONS} fit in one paper"
            )));
        }
        match self.check_taxonomy() {
            TaxonomyCheck::Exceeds { requested, available } => Err(MentorixError::InvalidConfig(format!(
                "Taxonomy distribution ({requested}) exceeds pattern menu questions ({available})"
            ))),
            check => Ok(check),
        }
    }

    /// Header block placed above the generated questions in the paper.
    pub fn question_paper_preamble(&self) -> String {
        let mut out = format!(
            "{RULE}\nQUESTION PAPER\n{RULE}\n\n\
             INSTRUCTIONS:\n\
             - Attempt all questions\n\
             - Write legible answers\n\
             - Show all steps/working\n\
             - Follow the given mark distribution\n"
        );
        let marks = self.mark_distribution();
        if !marks.is_empty() {
            out.push_str(&format!("\nMARK DISTRIBUTION:\n{marks}\n"));
        }
        if !self.taxonomy.is_empty() {
            out.push_str(&format!(
                "\nBLOOM'S TAXONOMY DISTRIBUTION:\n{}\n",
                self.taxonomy_instruction()
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_prefers_leading_keyword() {
        assert_eq!(
            detect_bloom_level("Explain normalization with suitable examples."),
            Some(BloomLevel::Understanding)
        );
        assert_eq!(
            detect_bloom_level("Design a schema for a library system"),
            Some(BloomLevel::Creating)
        );
        assert_eq!(
            detect_bloom_level("  Compare B-trees and hash indexes"),
            Some(BloomLevel::Analyzing)
        );
    }

    #[test]
    fn detect_blank_and_unmatched() {
        assert_eq!(detect_bloom_level("   "), None);
        assert_eq!(
            detect_bloom_level("Transactions in distributed databases"),
            Some(BloomLevel::Understanding)
        );
    }

    #[test]
    fn detect_ties_go_to_lower_level() {
        // "list" (Remembering) and "use" (Applying) both score 1.
        assert_eq!(
            detect_bloom_level("Tools we list and use daily"),
            Some(BloomLevel::Remembering)
        );
    }

    #[test]
    fn bloom_level_parses_case_insensitively() {
        assert_eq!("applying".parse::<BloomLevel>().unwrap(), BloomLevel::Applying);
        assert_eq!(" CREATING ".parse::<BloomLevel>().unwrap(), BloomLevel::Creating);
        assert!("memorising".parse::<BloomLevel>().is_err());
    }

    #[test]
    fn parse_cli_forms() {
        assert_eq!(
            "4x2".parse::<QuestionPattern>().unwrap(),
            QuestionPattern { count: 4, marks: 2 }
        );
        assert!("4*2".parse::<QuestionPattern>().is_err());

        let q: CustomQuestion = "5: Explain deadlocks".parse().unwrap();
        assert_eq!(q.marks, 5);
        assert_eq!(q.text, "Explain deadlocks");
        assert_eq!(q.level(), BloomLevel::Understanding);

        let t: TaxonomyTarget = "Applying=3".parse().unwrap();
        assert_eq!(t.level, BloomLevel::Applying);
        assert_eq!(t.count, 3);
    }

    #[test]
    fn mark_distribution_merges_and_sorts() {
        let bp = QuestionBlueprint {
            patterns: vec![
                QuestionPattern { count: 2, marks: 5 },
                QuestionPattern { count: 4, marks: 2 },
            ],
            custom: vec![
                CustomQuestion::new("Explain ACID", 5),
                CustomQuestion::new("   ", 10),
            ],
            taxonomy: vec![],
        };
        assert_eq!(bp.generated_count(), 6);
        assert_eq!(bp.custom_count(), 1);
        assert_eq!(bp.total_questions(), 7);
        assert_eq!(
            bp.mark_distribution(),
            "- 4 questions of 2 marks each\n- 3 questions of 5 marks each"
        );
    }

    #[test]
    fn instructions_without_extras() {
        let bp = QuestionBlueprint::default();
        assert!(bp.taxonomy_instruction().starts_with("No specific Bloom's"));
        assert_eq!(
            bp.custom_questions_instruction(),
            "No custom teacher-framed questions provided."
        );
    }

    #[test]
    fn instructions_with_extras() {
        let bp = QuestionBlueprint {
            patterns: vec![QuestionPattern { count: 4, marks: 2 }],
            custom: vec![CustomQuestion::new("Justify the use of indexes", 4)],
            taxonomy: vec![TaxonomyTarget {
                level: BloomLevel::Applying,
                count: 2,
            }],
        };
        assert_eq!(
            bp.taxonomy_instruction(),
            "FOR PATTERN MENU QUESTIONS ONLY:\n- 2 pattern questions at Applying level"
        );
        assert_eq!(
            bp.custom_questions_instruction(),
            "- (4 Marks) [Bloom's Level: Evaluating] Justify the use of indexes"
        );
    }

    #[test]
    fn taxonomy_check_variants() {
        let mut bp = QuestionBlueprint::default();
        assert_eq!(bp.check_taxonomy(), TaxonomyCheck::Unspecified);

        bp.taxonomy = vec![TaxonomyTarget { level: BloomLevel::Applying, count: 4 }];
        assert_eq!(bp.check_taxonomy(), TaxonomyCheck::Matches);

        bp.taxonomy[0].count = 1;
        assert_eq!(
            bp.check_taxonomy(),
            TaxonomyCheck::Short { requested: 1, available: 4 }
        );

        bp.taxonomy[0].count = 9;
        assert!(matches!(bp.validate(), Err(MentorixError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_zero_marks() {
        let bp = QuestionBlueprint {
            patterns: vec![QuestionPattern { count: 3, marks: 0 }],
            ..Default::default()
        };
        assert!(bp.validate().is_err());
    }

    #[test]
    fn huge_counts_saturate_and_are_rejected() {
        let bp = QuestionBlueprint::from_json_str(
            r#"{"patterns":[{"count":4294967295,"marks":1},{"count":1,"marks":1}],
                "custom":[{"text":"Define a key.","marks":1}],
                "taxonomy":[{"level":"Applying","count":4294967295},{"level":"Creating","count":1}]}"#,
        )
        .unwrap();
        assert_eq!(bp.generated_count(), u32::MAX);
        assert_eq!(bp.total_questions(), u32::MAX);
        assert_eq!(bp.marks_map()[&1], u32::MAX);
        assert_eq!(
            bp.check_taxonomy(),
            TaxonomyCheck::Matches
        );
        match bp.validate() {
            Err(MentorixError::InvalidConfig(msg)) => assert!(msg.contains("at most 200")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn question_cap_is_inclusive() {
        let mut bp = QuestionBlueprint {
            patterns: vec![QuestionPattern { count: MAX_QUESTIONS, marks: 1 }],
            ..Default::default()
        };
        assert!(bp.validate().is_ok());
        bp.custom.push(CustomQuestion::new("One more.", 2));
        assert!(bp.validate().is_err());
    }

    #[test]
    fn preamble_includes_bloom_only_when_targets_exist() {
        let mut bp = QuestionBlueprint::default();
        let plain = bp.question_paper_preamble();
        assert!(plain.contains("QUESTION PAPER"));
        assert!(plain.contains("MARK DISTRIBUTION:\n- 4 questions of 2 marks each"));
        assert!(!plain.contains("BLOOM'S TAXONOMY"));

        bp.taxonomy.push(TaxonomyTarget { level: BloomLevel::Remembering, count: 4 });
        assert!(bp.question_paper_preamble().contains("BLOOM'S TAXONOMY DISTRIBUTION:"));
    }

    #[test]
    fn blueprint_from_json_fills_defaults() {
        let bp = QuestionBlueprint::from_json_str(
            r#"{"custom": [{"text": "Define a primary key"}], "taxonomy": [{"level": "Remembering", "count": 2}]}"#,
        )
        .unwrap();
        assert_eq!(bp.patterns, QuestionBlueprint::default().patterns);
        assert_eq!(bp.custom[0].marks, 2);
        assert_eq!(bp.custom[0].level(), BloomLevel::Remembering);
        assert!(QuestionBlueprint::from_json_str("{not json").is_err());
    }
}
