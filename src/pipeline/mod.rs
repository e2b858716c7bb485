//! Pipeline stages for building a learning pack.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and swapped (another OCR engine, another PDF writer) without touching
//! the rest.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ llm ──▶ segment ──▶ render ──▶ archive
//! (path/URL) (text)    (4 sections) (split)  (PDFs)    (ZIP)
//!              │
//!              └─ pdfium ──▶ ocr   (scanned PDFs only)
//! ```
//!
//! 1. [`input`]   read the syllabus from disk or HTTP and sniff its format
//! 2. [`extract`] TXT, DOCX and PDF text; falls back to [`ocr`] when a PDF has
//!    no text layer
//! 3. [`pdfium`]  PDF text layer and page rasters, on `spawn_blocking` threads
//! 4. [`encode`]  PNG and base64 wrapping of page rasters for the OCR engines
//! 5. [`llm`]     model calls with timeout, retry and response validation;
//!    the only stage with network I/O besides downloads
//! 6. [`segment`] response cleanup and the section / question-bank split
//! 7. [`render`]  one A4 PDF per section
//! 8. [`archive`] the ZIP bundle

pub mod archive;
pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod pdfium;
pub mod render;
pub mod segment;
