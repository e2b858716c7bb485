//! Error types for the mentorix library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`MentorixError`]: **Fatal**: the learning pack cannot be produced at
//!   all (unreadable syllabus, provider not configured, every section failed).
//!   Returned as `Err(MentorixError)` from the top-level functions.
//!
//! * [`SectionError`]: **Non-fatal**: one section (say, the roadmap) failed
//!   after all retries while the others came back fine. Stored inside
//!   [`crate::output::SectionResult`] so callers still get a partial pack.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the mentorix library.
#[derive(Debug, Error)]
pub enum MentorixError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Syllabus file was not found at the given path.
    #[error("Syllabus file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Topic or syllabus is blank, or the input string is unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// File extension and content match none of the supported formats.
    #[error("Unsupported file type: .{extension} (supported: pdf, docx, txt)")]
    UnsupportedFormat { extension: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The document was read but yielded no usable text.
    #[error("{0}")]
    EmptyDocument(String),

    /// The DOCX container or its `word/document.xml` part is broken.
    #[error("DOCX error: {detail}")]
    Docx { detail: String },

    /// pdfium could not open the PDF.
    #[error("PDF '{name}' could not be opened: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF syllabi need the pdfium shared library. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/dir/containing/libpdfium.\n\
  • Install libpdfium system-wide.\n\
  • Convert the syllabus to .txt or .docx instead.\n"
    )]
    PdfiumBindingFailed(String),

    /// Rasterising a page for OCR failed.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    /// The OCR engine failed on a page.
    #[error("OCR failed on page {page}: {detail}")]
    OcrFailed { page: usize, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error after all retries.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// The LLM call timed out on every attempt.
    #[error("LLM call for '{label}' timed out after {secs}s on every attempt\nTry again or shorten the instructions.")]
    ApiTimeout { label: String, secs: u64 },

    /// The provider rejected the credentials (401/403); retrying won't help.
    #[error("Authentication error from the LLM provider: {detail}\nCheck that your API key is valid.")]
    AuthError { detail: String },

    /// The provider reported that the free quota is used up.
    #[error("LLM quota exhausted. Please retry after some time.")]
    QuotaExhausted,

    /// The model answered with (almost) nothing.
    #[error("Received empty or too short response from the LLM ({len} characters)")]
    ResponseTooShort { len: usize },

    /// Every section failed; there is nothing to render.
    #[error("All {total} sections failed.\nFirst error: {first_error}")]
    AllSectionsFailed { total: usize, first_error: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Building a PDF document failed.
    #[error("Failed to render '{title}' as PDF: {detail}")]
    RenderFailed { title: String, detail: String },

    /// Building the ZIP bundle failed.
    #[error("Failed to build archive: {0}")]
    ArchiveFailed(String),

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or blueprint validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single section of the pack.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SectionError {
    /// LLM call failed after retries.
    #[error("{section}: LLM call failed after {retries} retries: {detail}")]
    LlmFailed {
        section: String,
        retries: u32,
        detail: String,
    },

    /// The LLM answered but the answer was rejected.
    #[error("{section}: response rejected: {detail}")]
    Rejected { section: String, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = MentorixError::UnsupportedFormat {
            extension: "odt".into(),
        };
        assert_eq!(
            e.to_string(),
            "Unsupported file type: .odt (supported: pdf, docx, txt)"
        );
    }

    #[test]
    fn api_timeout_display() {
        let e = MentorixError::ApiTimeout {
            label: "roadmap".into(),
            secs: 180,
        };
        let msg = e.to_string();
        assert!(msg.contains("roadmap"), "got: {msg}");
        assert!(msg.contains("180s"), "got: {msg}");
    }

    #[test]
    fn too_short_display() {
        let e = MentorixError::ResponseTooShort { len: 12 };
        assert!(e.to_string().contains("12 characters"));
    }

    #[test]
    fn section_error_display() {
        let e = SectionError::LlmFailed {
            section: "notes".into(),
            retries: 3,
            detail: "503".into(),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("notes:"), "got: {msg}");
        assert!(msg.contains("3 retries"));
    }
}
