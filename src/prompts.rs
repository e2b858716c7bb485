//! Prompt templates for every LLM call mentorix makes.
//!
//! Centralising every prompt here keeps the wording in one place and lets the
//! unit tests inspect prompts without spinning up a real model. The
//! section headings requested here are exactly the markers
//! [`crate::pipeline::segment`] searches for, so the two must change
//! together.

use crate::blueprint::{QuestionBlueprint, RULE};

/// What the pack is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    /// A free-form topic name, e.g. "DBMS".
    Topic(String),
    /// Text extracted from an uploaded syllabus.
    Syllabus {
        text: String,
        /// File name or URL the text came from.
        source_name: String,
    },
}

impl Subject {
    /// Short human-readable label, used in logs and PDF metadata.
    pub fn label(&self) -> &str {
        match self {
            Subject::Topic(t) => t.trim(),
            Subject::Syllabus { source_name, .. } => source_name,
        }
    }

    /// The phrase that fills `{topic}` in the per-section prompts.
    fn prompt_subject(&self) -> String {
        match self {
            Subject::Topic(t) => t.trim().to_string(),
            Subject::Syllabus { text, .. } => {
                format!("the following syllabus\n\nSYLLABUS:\n{}\n", text.trim())
            }
        }
    }
}

fn with_instructions(prompt: String, instructions: Option<&str>) -> String {
    match instructions.map(str::trim).filter(|s| !s.is_empty()) {
        Some(extra) => format!("{prompt}\nADDITIONAL INSTRUCTIONS:\n{extra}\n"),
        None => prompt,
    }
}

/// Structured notes ("professor").
pub fn notes_prompt(subject: &Subject, instructions: Option<&str>) -> String {
    let prompt = format!(
        "\nProvide comprehensive structured notes for {}.\n\
         Include:\n\
         - Core concepts with explanations\n\
         - Key definitions\n\
         - Important formulas/theorems\n\
         - Real-world examples\n\
         Use clear headings and bullet points.\n",
        subject.prompt_subject()
    );
    with_instructions(prompt, instructions)
}

/// Learning roadmap ("advisor").
pub fn roadmap_prompt(subject: &Subject, instructions: Option<&str>) -> String {
    let prompt = format!(
        "\nCreate a structured learning roadmap for {}.\n\
         Include:\n\
         - Prerequisites\n\
         - Main learning stages\n\
         - Estimated time for each stage\n\
         - Recommended study sequence\n",
        subject.prompt_subject()
    );
    with_instructions(prompt, instructions)
}

/// Resource list ("librarian").
pub fn resources_prompt(subject: &Subject, instructions: Option<&str>) -> String {
    let prompt = format!(
        "\nList high-quality learning resources for {}.\n\
         Include:\n\
         - Textbooks/books\n\
         - Online courses\n\
         - Video tutorials\n\
         - Research papers\n\
         - GitHub repositories\n\
         - Websites/blogs\n",
        subject.prompt_subject()
    );
    with_instructions(prompt, instructions)
}

/// Question bank with answer key ("assistant").
pub fn question_bank_prompt(
    subject: &Subject,
    instructions: Option<&str>,
    blueprint: &QuestionBlueprint,
) -> String {
    let prompt = format!(
        "\nYou are an exam paper setter. Create a complete question bank with answers for {subject}.\n\n\
         OUTPUT FORMAT (IMPORTANT - FOLLOW EXACTLY - TWO SECTIONS):\n\n\
         {format}\n\
         Make each answer comprehensive, include formulas, working, and diagrams descriptions where needed.\n",
        subject = subject.prompt_subject(),
        format = question_bank_format(blueprint, true),
    );
    with_instructions(prompt, instructions)
}

/// One prompt asking for all four sections at once.
pub fn master_prompt(
    subject: &Subject,
    instructions: Option<&str>,
    blueprint: &QuestionBlueprint,
) -> String {
    let (topic, syllabus) = match subject {
        Subject::Topic(t) => (t.trim(), "Not provided"),
        Subject::Syllabus { text, .. } => ("Derive from syllabus", text.trim()),
    };
    let instructions = instructions
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("None");
    let generated = blueprint.generated_count();
    let custom = blueprint.custom_count();
    let total = blueprint.total_questions();

    format!(
        "\nYou are an academic expert.\n\n\
         TOPIC:\n{topic}\n\n\
         SYLLABUS:\n{syllabus}\n\n\
         INSTRUCTIONS:\n{instructions}\n\n\
         QUESTION STRUCTURE:\n{marks}\n\n\
         BLOOM'S TAXONOMY DISTRIBUTION:\n{taxonomy}\n\n\
         CUSTOM TEACHER-FRAMED QUESTIONS (MANDATORY TO INCLUDE):\n{custom_list}\n\n\
         RULES:\n\
         - Strictly syllabus-based\n\
         - Exam-oriented language\n\
         - Bloom's taxonomy distribution applies ONLY to pattern-menu questions ({generated} questions)\n\
         - Custom questions MUST use their specified Bloom's levels (already defined)\n\
         - Total questions must be exactly {total}\n\
         - Pattern-menu questions count must be exactly {generated}\n\
         - Custom questions count must be exactly {custom}\n\
         - If custom teacher-framed questions are provided, include them verbatim with the same marks and same Bloom's level, and generate answers for them\n\
         - Do not label questions as custom; present all questions in one unified list\n\
         - Ensure mark distribution and answer key match the final question list exactly\n\
         - Provide answers clearly\n\
         - Do not add any introduction, disclaimer, or summary before section headers\n\n\
         OUTPUT SECTIONS:\n\
         SECTION 1: STRUCTURED NOTES\n\
         SECTION 2: LEARNING ROADMAP\n\
         SECTION 3: IMPORTANT RESOURCES\n\
         SECTION 4: QUESTION BANK WITH ANSWERS\n\n\
         QUESTION BANK FORMAT (IMPORTANT - FOLLOW EXACTLY):\n\n\
         {format}",
        marks = blueprint.mark_distribution(),
        taxonomy = blueprint.taxonomy_instruction(),
        custom_list = blueprint.custom_questions_instruction(),
        format = question_bank_format(blueprint, false),
    )
}

/// The two-part question paper / answer key layout the model must follow.
///
/// `detailed` adds the per-question generation rules used by the dedicated
/// question-bank call.
fn question_bank_format(blueprint: &QuestionBlueprint, detailed: bool) -> String {
    let mut out = format!(
        "{RULE}\nSECTION 1: QUESTIONS ONLY (FOR STUDENTS)\n{RULE}\n\n\
         INSTRUCTIONS:\n\
         - Attempt all questions\n\
         - Write legible answers\n\
         - Show all steps/working\n\
         - Follow the given mark distribution\n\n\
         MARK DISTRIBUTION:\n{marks}\n\n\
         BLOOM'S TAXONOMY DISTRIBUTION:\n{taxonomy}\n\n",
        marks = blueprint.mark_distribution(),
        taxonomy = blueprint.taxonomy_instruction(),
    );

    if detailed {
        out.push_str(&format!(
            "CUSTOM TEACHER-FRAMED QUESTIONS (MANDATORY TO INCLUDE):\n{custom_list}\n\n\
             QUESTIONS:\n\
             [Generate exactly {total} questions in total: {generated} from the pattern menu + {custom} custom teacher-framed questions.]\n\
             [Include each custom teacher-framed question exactly once with its exact marks and Bloom's level as provided above, but do NOT label or separate them as custom in the final question paper.]\n\
             [Treat all questions as one single question category in the final paper with a single mark distribution block.]\n\
             [Ensure answer key contains exactly one matching answer for each question with same numbering and marks alignment.]\n\
             [Format each question as:]\n\n",
            custom_list = blueprint.custom_questions_instruction(),
            total = blueprint.total_questions(),
            generated = blueprint.generated_count(),
            custom = blueprint.custom_count(),
        ));
    } else {
        out.push_str("QUESTIONS:\n\n");
    }

    out.push_str(&format!(
        "Question 1 (X Marks) [Bloom's Level: Understanding]: [Question text]\n\n\
         Question 2 (X Marks) [Bloom's Level: Applying]: [Question text]\n\n\
         ... and so on\n\n\
         {RULE}\nSECTION 2: ANSWER KEY (FOR TEACHERS)\n{RULE}\n\n\
         ANSWER KEY:\n\n\
         Answer 1 [Bloom's Level: Understanding]:\n\
         [Detailed explanation with steps, formulas, and working]\n\n\
         Answer 2 [Bloom's Level: Applying]:\n\
         [Detailed explanation with steps, formulas, and working]\n\n\
         ... and so on\n"
    ));
    out
}

/// System prompt for transcribing a scanned syllabus page with a vision model.
pub const OCR_SYSTEM_PROMPT: &str = r#"You are an OCR engine. Transcribe ALL text visible in the page image.

Rules:
- Preserve the reading order a human would use
- Keep headings, numbered units and bullet lists on their own lines
- Do NOT summarise, translate, or add commentary
- Do NOT wrap the output in code fences
- If the page has no readable text, output nothing"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blueprint::{CustomQuestion, QuestionPattern};

    fn topic() -> Subject {
        Subject::Topic("  DBMS ".into())
    }

    #[test]
    fn section_prompts_mention_topic() {
        assert!(notes_prompt(&topic(), None).contains("structured notes for DBMS."));
        assert!(roadmap_prompt(&topic(), None).contains("learning roadmap for DBMS."));
        assert!(resources_prompt(&topic(), None).contains("resources for DBMS."));
    }

    #[test]
    fn syllabus_text_is_embedded() {
        let s = Subject::Syllabus {
            text: "Unit 1: Relational model".into(),
            source_name: "dbms.pdf".into(),
        };
        let p = notes_prompt(&s, None);
        assert!(p.contains("SYLLABUS:\nUnit 1: Relational model"));
        assert_eq!(s.label(), "dbms.pdf");
    }

    #[test]
    fn instructions_appended_only_when_present() {
        let with = roadmap_prompt(&topic(), Some("Only Module 1"));
        assert!(with.contains("ADDITIONAL INSTRUCTIONS:\nOnly Module 1"));
        let blank = roadmap_prompt(&topic(), Some("   "));
        assert!(!blank.contains("ADDITIONAL INSTRUCTIONS"));
    }

    #[test]
    fn question_bank_prompt_counts() {
        let bp = QuestionBlueprint {
            patterns: vec![QuestionPattern { count: 3, marks: 5 }],
            custom: vec![CustomQuestion::new("Explain 2PL", 10)],
            taxonomy: vec![],
        };
        let p = question_bank_prompt(&topic(), None, &bp);
        assert!(p.contains("Generate exactly 4 questions in total: 3 from the pattern menu + 1 custom"));
        assert!(p.contains("- 3 questions of 5 marks each\n- 1 questions of 10 marks each"));
        assert!(p.contains("SECTION 1: QUESTIONS ONLY (FOR STUDENTS)"));
        assert!(p.contains("SECTION 2: ANSWER KEY (FOR TEACHERS)"));
    }

    #[test]
    fn master_prompt_lists_all_sections() {
        let p = master_prompt(&topic(), None, &QuestionBlueprint::default());
        for heading in [
            "SECTION 1: STRUCTURED NOTES",
            "SECTION 2: LEARNING ROADMAP",
            "SECTION 3: IMPORTANT RESOURCES",
            "SECTION 4: QUESTION BANK WITH ANSWERS",
        ] {
            assert!(p.contains(heading), "missing {heading}");
        }
        assert!(p.contains("TOPIC:\nDBMS"));
        assert!(p.contains("SYLLABUS:\nNot provided"));
        assert!(p.contains("INSTRUCTIONS:\nNone"));
        assert!(p.contains("Total questions must be exactly 4"));
    }
}
