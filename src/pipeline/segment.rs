//! Segmentation: cut a model response into the four pack sections, and a
//! question bank into its question paper and answer key.
//!
//! Models are told which headings to use, but they paraphrase, renumber and
//! drop them. Everything here is best-effort with fallbacks, and never fails:
//! the worst outcome is that all the text lands in the notes.
//!
//! The `regex` crate has no lookaround, so "block runs until the next
//! header" is done by locating headers and slicing between them.

use crate::output::QuestionBank;
use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholder answer key when the model returned none.
pub const NO_ANSWER_KEY: &str = "No answer key found";

// ── Response cleanup ─────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|text|md)?\n(.*)\n```\s*$").unwrap());

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

/// Deterministic cleanup of a raw model answer before segmentation.
///
/// 1. Drop carriage returns
/// 2. Strip an outer code fence (models add one despite being told not to)
/// 3. Remove invisible Unicode (zero-width space/joiners, BOM, soft hyphen)
/// 4. Trim trailing whitespace per line, collapse runs of blank lines
pub fn tidy_response(input: &str) -> String {
    let s = input.replace('\r', "");
    let s = strip_outer_fence(&s);
    let s = remove_invisible_chars(&s);
    let s = s.lines().map(str::trim_end).collect::<Vec<_>>().join("\n");
    RE_BLANK_LINES.replace_all(&s, "\n\n\n").trim().to_string()
}

fn strip_outer_fence(input: &str) -> String {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Section split ────────────────────────────────────────────────────────────

static RE_NOTES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|\n)\s*(?:SECTION\s*1\s*:\s*STRUCTURED\s*NOTES|1\.\s*STRUCTURED\s*NOTES)")
        .unwrap()
});

static RE_ROADMAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|\n)\s*(?:SECTION\s*2\s*:\s*LEARNING\s*ROADMAP|2\.\s*LEARNING\s*ROADMAP)")
        .unwrap()
});

static RE_RESOURCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:^|\n)\s*(?:SECTION\s*3\s*:\s*IMPORTANT\s*RESOURCES|3\.\s*IMPORTANT\s*RESOURCES)",
    )
    .unwrap()
});

static RE_QBANK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)(?:^|\n)\s*(?:",
        r"SECTION\s*4\s*:\s*QUESTION\s*BANK\s*WITH\s*ANSWERS",
        r"|4\.\s*QUESTION\s*BANK\s*WITH\s*ANSWERS",
        r"|4\.\s*QUESTION\s*BANK",
        r"|SECTION\s*4\s*:\s*QUESTION\s*BANK",
        r"|SECTION\s*1\s*:\s*QUESTIONS\s*ONLY\s*\(FOR\s*STUDENTS\)",
        r"|SECTION\s*1\s*:\s*QUESTION\s*PAPER",
        r")"
    ))
    .unwrap()
});

/// Start of a question paper, when the model skipped the section heading.
static RE_QPAPER_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:^|\n)\s*(?:SECTION\s*1\s*:\s*QUESTIONS\s*ONLY\s*\(FOR\s*STUDENTS\)|SECTION\s*1\s*:\s*QUESTION\s*PAPER)",
    )
    .unwrap()
});

/// The four sections of a combined response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    pub notes: String,
    pub roadmap: String,
    pub resources: String,
    pub qbank: String,
}

#[derive(Clone, Copy)]
enum Slot {
    Notes,
    Roadmap,
    Resources,
    Qbank,
}

/// Split a combined response by its section headings.
///
/// Each heading's first match marks where its section starts; a section runs
/// to the next start. No headings at all puts everything in `notes`.
pub fn split_sections(text: &str) -> Sections {
    let text = text.replace('\r', "");
    let mut sections = Sections::default();

    let patterns: [(Slot, &Regex); 4] = [
        (Slot::Notes, &RE_NOTES),
        (Slot::Roadmap, &RE_ROADMAP),
        (Slot::Resources, &RE_RESOURCES),
        (Slot::Qbank, &RE_QBANK),
    ];

    let mut starts: Vec<(usize, Slot)> = patterns
        .iter()
        .filter_map(|(slot, re)| re.find(&text).map(|m| (m.start(), *slot)))
        .collect();
    starts.sort_by_key(|(pos, _)| *pos);

    for (idx, (start, slot)) in starts.iter().enumerate() {
        let end = starts.get(idx + 1).map_or(text.len(), |(next, _)| *next);
        let body = text[*start..end].trim().to_string();
        match slot {
            Slot::Notes => sections.notes = body,
            Slot::Roadmap => sections.roadmap = body,
            Slot::Resources => sections.resources = body,
            Slot::Qbank => sections.qbank = body,
        }
    }

    if sections.notes.is_empty() {
        sections.notes = text.clone();
    }

    if sections.qbank.is_empty() {
        if let Some(m) = RE_QPAPER_HEADING.find(&text) {
            sections.qbank = text[m.start()..].trim().to_string();
        }
    }

    sections
}

// ── Question bank split ──────────────────────────────────────────────────────

static RE_QPAPER_START: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:SECTION\s*1\s*:\s*QUESTIONS\s*ONLY|SECTION\s*1\s*:\s*QUESTION\s*PAPER|QUESTIONS\s*ONLY\s*\(FOR\s*STUDENTS\))",
    )
    .unwrap()
});

static RE_SECTION1_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)SECTION\s*1.*?(?:QUESTIONS?:|$)").unwrap());

static RE_SECTION2_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)SECTION\s*2.*?(?:ANSWER\s*KEY:?|$)").unwrap());

static RE_ANSWER_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ANSWER\s*KEY\s*:?").unwrap());

static RE_ANSWER_HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Answer\s*\d+\s*[:.)\-]").unwrap());

static RE_ANSWER_NEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\n\s*Answer\s*\d+\s*[:.)\-]").unwrap());

static RE_QUESTION_HEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)Question\s*\d+\s*\([^\n]*\)\s*[:.)\-]").unwrap());

static RE_QUESTION_NEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\n\s*Question\s*\d+\s*\(").unwrap());

/// Separate a question bank into the student paper and the answer key.
pub fn split_question_bank(qbank: &str) -> QuestionBank {
    let mut text = qbank.replace('\r', "");
    if let Some(m) = RE_QPAPER_START.find(&text) {
        text = text[m.start()..].to_string();
    }

    let mut questions = String::new();
    let mut answers = String::new();

    if let Some(idx) = text.find("SECTION 2") {
        questions = RE_SECTION1_HEADER
            .replace_all(text[..idx].trim(), "")
            .trim()
            .to_string();
        answers = RE_SECTION2_HEADER
            .replace_all(text[idx..].trim(), "")
            .trim()
            .to_string();
    } else {
        if let Some(m) = RE_ANSWER_KEY.find(&text) {
            questions = text[..m.start()].trim().to_string();
            answers = text[m.end()..].trim().to_string();
        }

        if answers.is_empty() {
            answers = collect_blocks(&text, &RE_ANSWER_HEAD, &RE_ANSWER_NEXT).join("\n\n");
        }
        if questions.is_empty() {
            questions = collect_blocks(&text, &RE_QUESTION_HEAD, &RE_QUESTION_NEXT).join("\n\n");
        }

        if questions.is_empty() && answers.is_empty() {
            questions = text.clone();
            answers = NO_ANSWER_KEY.to_string();
        }
    }

    QuestionBank { questions, answers }
}

/// Bodies of `head`-introduced blocks, each running to the next `next` match.
fn collect_blocks(text: &str, head: &Regex, next: &Regex) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut pos = 0;

    while let Some(h) = head.find_at(text, pos) {
        let end = next.find_at(text, h.end()).map_or(text.len(), |n| n.start());
        let body = text[h.end()..end].trim();
        if !body.is_empty() {
            blocks.push(body.to_string());
        }
        pos = end;
    }

    blocks
}

/// The printable question paper: preamble, questions, then the answer key
/// behind a double rule.
pub fn assemble_question_paper(preamble: &str, bank: &QuestionBank) -> String {
    let rule = "═".repeat(40);
    let paper = format!("{}\n{}", preamble, bank.questions);
    format!(
        "{}\n\n{rule}\nANSWER KEY\n{rule}\n\n{}",
        paper.trim(),
        bank.answers
    )
    .trim()
    .to_string()
}
