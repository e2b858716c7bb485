//! PDF rendering: lay out a section's text on A4 pages and write it with
//! `lopdf`, using the built-in Helvetica fonts.
//!
//! ## Layout
//!
//! Positions are tracked in millimetres from the top-left corner and only
//! converted to PDF points (bottom-left origin) when an operator is emitted.
//! Every page gets the title as a centred header and "Page N" as a centred
//! footer. Text is set one line at a time: each line is classified (heading,
//! label, bullet, …), wrapped to the available width with the Helvetica
//! metrics, and placed in cells of a fixed height per style. A cell that
//! would cross the bottom margin starts a new page.
//!
//! ## Encoding
//!
//! The standard 14 fonts only cover WinAnsi (CP-1252). Characters outside it
//! are transliterated where a close form exists (box-drawing rules, arrows,
//! odd dashes and bullets) and dropped otherwise.

use crate::error::MentorixError;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

// ── Page geometry (mm) ───────────────────────────────────────────────────────

const PT_PER_MM: f32 = 72.0 / 25.4;
const PAGE_W_PT: f32 = 595.28;
const PAGE_H_PT: f32 = 841.89;
const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;

const SIDE_MARGIN: f32 = 15.0;
const LIST_INDENT: f32 = 20.0;
const TOP_MARGIN: f32 = 10.0;
/// Content may not extend below `PAGE_H - BOTTOM_MARGIN`.
const BOTTOM_MARGIN: f32 = 20.0;
/// Horizontal padding inside a text cell.
const CELL_PAD: f32 = 1.0;

const HEADER_CELL: f32 = 12.0;
const HEADER_GAP: f32 = 8.0;
const FOOTER_FROM_BOTTOM: f32 = 15.0;
const FOOTER_CELL: f32 = 10.0;

const NAVY: Rgb = Rgb(0, 51, 102);
const DARK_GREY: Rgb = Rgb(51, 51, 51);
const GREY: Rgb = Rgb(128, 128, 128);
const BLACK: Rgb = Rgb(0, 0, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rgb(u8, u8, u8);

// ── Fonts ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
    Oblique,
}

impl Font {
    const ALL: [Font; 3] = [Font::Regular, Font::Bold, Font::Oblique];

    fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Oblique => "F3",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Oblique => "Helvetica-Oblique",
        }
    }

    /// Advance width of a WinAnsi byte in 1/1000 em.
    fn width(self, byte: u8) -> u16 {
        let table = match self {
            Font::Bold => &HELVETICA_BOLD_WIDTHS,
            Font::Regular | Font::Oblique => &HELVETICA_WIDTHS,
        };
        match byte {
            32..=126 => table[(byte - 32) as usize],
            0x95 => 350,
            0x85 | 0x97 | 0x89 => 1000,
            0x91 | 0x92 | 0x82 => {
                if self == Font::Bold {
                    278
                } else {
                    222
                }
            }
            0x93 | 0x94 | 0x84 => {
                if self == Font::Bold {
                    500
                } else {
                    333
                }
            }
            0xA0 => 278,
            _ => 556,
        }
    }

    /// Width of `text` in millimetres at `size` points.
    fn text_width_mm(self, text: &[u8], size: f32) -> f32 {
        let units: u32 = text.iter().map(|&b| u32::from(self.width(b))).sum();
        units as f32 * size / 1000.0 / PT_PER_MM
    }
}

/// Helvetica advance widths for ASCII 32..=126.
#[rustfmt::skip]
static HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Helvetica-Bold advance widths for ASCII 32..=126.
#[rustfmt::skip]
static HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

// ── WinAnsi ──────────────────────────────────────────────────────────────────

/// Encode `text` as WinAnsi bytes, transliterating or dropping what the
/// encoding lacks.
pub fn to_win_ansi(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ' '..='~' => out.push(c as u8),
            '\t' => out.extend_from_slice(b"    "),
            '\u{A0}'..='\u{FF}' => out.push(c as u32 as u8),
            _ => match win_ansi_high(c) {
                Some(byte) => out.push(byte),
                None => out.extend_from_slice(transliterate(c)),
            },
        }
    }
    out
}

/// The 0x80..=0x9F block, where CP-1252 differs from Latin-1.
fn win_ansi_high(c: char) -> Option<u8> {
    let byte = match c {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(byte)
}

fn transliterate(c: char) -> &'static [u8] {
    match c {
        '═' | '━' | '▬' => b"=",
        '─' | '―' | '‐' | '‑' | '‒' | '−' => b"-",
        '│' | '┃' => b"|",
        '◦' | '▪' | '▫' | '‣' | '●' | '○' | '■' | '□' | '►' | '▶' | '➢' => b"\x95",
        '→' | '⟶' | '➔' => b"->",
        '←' => b"<-",
        '↔' => b"<->",
        '⇒' => b"=>",
        '≤' => b"<=",
        '≥' => b">=",
        '≠' => b"!=",
        '≈' => b"~",
        '′' => b"'",
        '″' => b"\"",
        '\u{2002}' | '\u{2003}' | '\u{2009}' | '\u{202F}' => b" ",
        _ => b"",
    }
}

// ── Line classification ──────────────────────────────────────────────────────

static RE_SECTION_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(INSTRUCTIONS|QUESTIONS|ANSWER KEY|MARK DISTRIBUTION|SECTION\s+\d+)\s*:?$")
        .unwrap()
});

static RE_QA_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(Question\s*\d+|Answer\s*\d+)\b").unwrap());

static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+[.)]").unwrap());

/// How one source line is set.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Blank,
    Heading(String),
    Subheading(String),
    Label(String),
    Strong(String),
    Bullet(String),
    Numbered(String),
    Paragraph(String),
}

/// Classify a line; the first matching rule wins.
fn classify(raw: &str) -> Block {
    let line = raw.trim();

    if line.is_empty() {
        return Block::Blank;
    }
    if let Some(rest) = line.strip_prefix("## ") {
        return Block::Heading(rest.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix("### ") {
        return Block::Subheading(rest.trim().to_string());
    }
    if RE_SECTION_LABEL.is_match(line) {
        return Block::Label(line.to_uppercase());
    }
    if RE_QA_LABEL.is_match(line) {
        return Block::Strong(line.to_string());
    }
    if line.contains("**") {
        return Block::Strong(line.replace("**", ""));
    }
    if let Some(rest) = ["- ", "* ", "• "]
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix))
    {
        return Block::Bullet(format!("  {}", rest.trim()));
    }
    if RE_NUMBERED.is_match(line) {
        return Block::Numbered(line.to_string());
    }
    Block::Paragraph(line.to_string())
}

/// Font, size, colour and cell height for a run of text.
#[derive(Debug, Clone, Copy)]
struct Style {
    font: Font,
    size: f32,
    color: Rgb,
    line_height: f32,
}

const BODY: Style = Style {
    font: Font::Regular,
    size: 11.0,
    color: BLACK,
    line_height: 6.0,
};

const STRONG: Style = Style {
    font: Font::Bold,
    ..BODY
};

// ── Page builder ─────────────────────────────────────────────────────────────

/// Accumulates content-stream operations page by page.
struct PageBuilder {
    title: Vec<u8>,
    pages: Vec<Vec<Operation>>,
    /// Top of the next cell, in mm from the top edge.
    y: f32,
}

impl PageBuilder {
    fn new(title: &str) -> Self {
        let mut builder = Self {
            title: to_win_ansi(title),
            pages: Vec::new(),
            y: TOP_MARGIN,
        };
        builder.add_page();
        builder
    }

    fn add_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = TOP_MARGIN;

        let header = Style {
            font: Font::Bold,
            size: 16.0,
            color: NAVY,
            line_height: HEADER_CELL,
        };
        let title = self.title.clone();
        self.centred(&title, header, self.y);
        self.y += HEADER_CELL + HEADER_GAP;
    }

    fn gap(&mut self, mm: f32) {
        self.y += mm;
    }

    /// Wrap `text` to the width left of `indent` and set it line by line.
    fn paragraph(&mut self, text: &str, style: Style, indent: f32) {
        let bytes = to_win_ansi(text);
        let width = PAGE_W - indent - SIDE_MARGIN - 2.0 * CELL_PAD;
        for line in wrap(&bytes, style.font, style.size, width) {
            if self.y + style.line_height > PAGE_H - BOTTOM_MARGIN {
                self.add_page();
            }
            self.show(&line, style, indent + CELL_PAD, baseline(self.y, style));
            self.y += style.line_height;
        }
    }

    fn centred(&mut self, text: &[u8], style: Style, cell_top: f32) {
        let width = style.font.text_width_mm(text, style.size);
        self.show(text, style, (PAGE_W - width) / 2.0, baseline(cell_top, style));
    }

    fn show(&mut self, text: &[u8], style: Style, x_mm: f32, baseline_mm: f32) {
        if let Some(page) = self.pages.last_mut() {
            page.extend(text_ops(text, style, x_mm, baseline_mm));
        }
    }

    fn push_line(&mut self, raw: &str) {
        match classify(raw) {
            Block::Blank => self.gap(4.0),
            Block::Heading(text) => {
                self.gap(3.0);
                let style = Style {
                    font: Font::Bold,
                    size: 14.0,
                    color: NAVY,
                    line_height: 8.0,
                };
                self.paragraph(&text, style, SIDE_MARGIN);
                self.gap(2.0);
            }
            Block::Subheading(text) => {
                self.gap(2.0);
                let style = Style {
                    font: Font::Bold,
                    size: 12.0,
                    color: DARK_GREY,
                    line_height: 7.0,
                };
                self.paragraph(&text, style, SIDE_MARGIN);
                self.gap(1.0);
            }
            Block::Label(text) => {
                self.gap(2.0);
                let style = Style {
                    font: Font::Bold,
                    size: 12.0,
                    color: NAVY,
                    line_height: 7.0,
                };
                self.paragraph(&text, style, SIDE_MARGIN);
                self.gap(1.0);
            }
            Block::Strong(text) => self.paragraph(&text, STRONG, SIDE_MARGIN),
            Block::Bullet(text) | Block::Numbered(text) => {
                self.paragraph(&text, BODY, LIST_INDENT)
            }
            Block::Paragraph(text) => self.paragraph(&text, BODY, SIDE_MARGIN),
        }
    }

    /// Stamp the footers and hand back one operation list per page.
    fn finish(mut self) -> Vec<Vec<Operation>> {
        let footer = Style {
            font: Font::Oblique,
            size: 8.0,
            color: GREY,
            line_height: FOOTER_CELL,
        };
        let footer_baseline = baseline(PAGE_H - FOOTER_FROM_BOTTOM, footer);
        for (idx, page) in self.pages.iter_mut().enumerate() {
            let label = format!("Page {}", idx + 1).into_bytes();
            let width = footer.font.text_width_mm(&label, footer.size);
            page.extend(text_ops(&label, footer, (PAGE_W - width) / 2.0, footer_baseline));
        }
        self.pages
    }
}

/// Baseline for a cell: vertically centred in the cell.
fn baseline(cell_top: f32, style: Style) -> f32 {
    cell_top + style.line_height / 2.0 + 0.3 * style.size / PT_PER_MM
}

/// One text object at (`x_mm`, `baseline_mm`), measured from the top-left.
fn text_ops(text: &[u8], style: Style, x_mm: f32, baseline_mm: f32) -> Vec<Operation> {
    let Rgb(r, g, b) = style.color;
    vec![
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![style.font.resource_name().into(), style.size.into()],
        ),
        Operation::new(
            "rg",
            vec![
                (f32::from(r) / 255.0).into(),
                (f32::from(g) / 255.0).into(),
                (f32::from(b) / 255.0).into(),
            ],
        ),
        Operation::new(
            "Td",
            vec![
                (x_mm * PT_PER_MM).into(),
                (PAGE_H_PT - baseline_mm * PT_PER_MM).into(),
            ],
        ),
        Operation::new("Tj", vec![Object::string_literal(text.to_vec())]),
        Operation::new("ET", vec![]),
    ]
}

/// Break `text` into lines no wider than `max_width_mm`.
///
/// Lines break at the last space that fits; a word wider than the line is
/// broken between characters. Spaces around a break are dropped and
/// whitespace-only segments are skipped.
fn wrap(text: &[u8], font: Font, size: f32, max_width_mm: f32) -> Vec<Vec<u8>> {
    let max_units = max_width_mm * PT_PER_MM * 1000.0 / size;
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;
    let mut last_space: Option<usize> = None;
    let mut width = 0.0f32;

    while i < text.len() {
        if text[i] == b' ' {
            last_space = Some(i);
        }
        width += f32::from(font.width(text[i]));
        if width > max_units {
            match last_space {
                Some(space) if space > start => {
                    push_trimmed(&mut lines, &text[start..space]);
                    i = space + 1;
                }
                _ => {
                    if i == start {
                        i += 1;
                    }
                    push_trimmed(&mut lines, &text[start..i]);
                }
            }
            while i < text.len() && text[i] == b' ' {
                i += 1;
            }
            start = i;
            last_space = None;
            width = 0.0;
            continue;
        }
        i += 1;
    }

    push_trimmed(&mut lines, &text[start..]);
    if lines.is_empty() {
        lines.push(Vec::new());
    }
    lines
}

fn push_trimmed(lines: &mut Vec<Vec<u8>>, segment: &[u8]) {
    let first = segment.iter().position(|&b| b != b' ');
    let last = segment.iter().rposition(|&b| b != b' ');
    if let (Some(first), Some(last)) = (first, last) {
        lines.push(segment[first..=last].to_vec());
    }
}

// ── Document assembly ────────────────────────────────────────────────────────

/// Render `content` as a paginated A4 PDF headed with `title`.
pub fn render_pdf(title: &str, content: &str) -> Result<Vec<u8>, MentorixError> {
    let mut builder = PageBuilder::new(title);
    for line in content.split('\n') {
        builder.push_line(line);
    }
    let pages = builder.finish();
    debug!("'{}': laid out {} pages", title, pages.len());
    write_document(title, pages)
}

fn write_document(title: &str, pages: Vec<Vec<Operation>>) -> Result<Vec<u8>, MentorixError> {
    let fail = |detail: String| MentorixError::RenderFailed {
        title: title.to_string(),
        detail,
    };

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = lopdf::Dictionary::new();
    for font in Font::ALL {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(font.resource_name(), font_id);
    }
    let resources_id = doc.add_object(dictionary! { "Font" => fonts });

    let mut kids = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let encoded = content.encode().map_err(|e| fail(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_W_PT.into(), PAGE_H_PT.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(to_win_ansi(title)),
        "Producer" => Object::string_literal("mentorix"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut buf = Vec::new();
    doc.save_to(&mut buf).map_err(|e| fail(e.to_string()))?;
    Ok(buf)
}
