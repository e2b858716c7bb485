//! Configuration types for learning-pack generation.
//!
//! All behaviour is controlled through [`PackConfig`], built via its
//! [`PackConfigBuilder`]. The builder lets callers set only what they care
//! about and rely on documented defaults for the rest.

use crate::error::MentorixError;
use crate::pipeline::llm::TextGenerator;
use crate::pipeline::ocr::OcrEngine;
use crate::progress::PackProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Provider used when neither the config nor the environment names one.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used with [`DEFAULT_PROVIDER`].
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for a learning-pack run.
///
/// # Example
/// ```rust
/// use mentorix::{GenerationMode, PackConfig};
///
/// let config = PackConfig::builder()
///     .mode(GenerationMode::Combined)
///     .max_retries(2)
///     .model("gemini-2.5-flash")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PackConfig {
    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`] for the default
    /// provider, or the provider's own default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed text generator. Takes precedence over every provider
    /// setting; used by tests and by callers with their own client.
    pub generator: Option<Arc<dyn TextGenerator>>,

    /// Sampling temperature. Default: 0.7.
    ///
    /// Teaching material benefits from some variety in examples; the value
    /// is clamped to 0.0–2.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 8192.
    ///
    /// A question bank with a detailed answer key for ten questions easily
    /// exceeds 4 000 tokens.
    pub max_tokens: usize,

    /// Retries after the first failed attempt. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 2000.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 180.
    ///
    /// Long-form generation on free-tier endpoints regularly takes more than
    /// a minute.
    pub api_timeout_secs: u64,

    /// One call per section or one combined call. Default: per section.
    pub mode: GenerationMode,

    /// Maximum concurrent LLM calls in per-section mode. Default: 4.
    pub concurrency: usize,

    /// Responses shorter than this (after trimming) are rejected. Default: 100.
    pub min_response_chars: usize,

    /// OCR engine for scanned PDFs. Default: Tesseract.
    pub ocr: OcrBackend,

    /// Tesseract language code(s), e.g. "eng" or "eng+hin". Default: "eng".
    pub ocr_language: String,

    /// Pages rasterised for OCR, starting from page 1. Default: 10.
    pub ocr_max_pages: usize,

    /// Longest edge of a rasterised page in pixels. Default: 2000.
    pub max_rendered_pixels: u32,

    /// Directory holding the pdfium shared library. Falls back to
    /// `PDFIUM_LIB_PATH`, then to the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Download timeout for URL syllabi in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Pre-constructed OCR engine. Takes precedence over `ocr`.
    pub ocr_engine: Option<Arc<dyn OcrEngine>>,

    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn PackProgressCallback>>,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            generator: None,
            temperature: 0.7,
            max_tokens: 8192,
            max_retries: 3,
            retry_backoff_ms: 2000,
            api_timeout_secs: 180,
            mode: GenerationMode::default(),
            concurrency: 4,
            min_response_chars: 100,
            ocr: OcrBackend::default(),
            ocr_language: "eng".to_string(),
            ocr_max_pages: 10,
            max_rendered_pixels: 2000,
            pdfium_lib_path: None,
            download_timeout_secs: 120,
            ocr_engine: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PackConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("generator", &self.generator.as_ref().map(|_| "<dyn TextGenerator>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("mode", &self.mode)
            .field("concurrency", &self.concurrency)
            .field("ocr", &self.ocr)
            .field("ocr_engine", &self.ocr_engine.as_ref().map(|e| e.name()))
            .field("ocr_max_pages", &self.ocr_max_pages)
            .finish()
    }
}

impl PackConfig {
    /// Create a new builder for `PackConfig`.
    pub fn builder() -> PackConfigBuilder {
        PackConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PackConfig`].
#[derive(Debug)]
pub struct PackConfigBuilder {
    config: PackConfig,
}

impl PackConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn mode(mut self, mode: GenerationMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn min_response_chars(mut self, n: usize) -> Self {
        self.config.min_response_chars = n;
        self
    }

    pub fn ocr(mut self, backend: OcrBackend) -> Self {
        self.config.ocr = backend;
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_max_pages(mut self, n: usize) -> Self {
        self.config.ocr_max_pages = n;
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn ocr_engine(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.config.ocr_engine = Some(engine);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn PackProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PackConfig, MentorixError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(MentorixError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        if c.ocr_max_pages == 0 {
            return Err(MentorixError::InvalidConfig("OCR page limit must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(MentorixError::InvalidConfig("API timeout must be ≥ 1 second".into()));
        }
        if c.ocr_language.trim().is_empty() {
            return Err(MentorixError::InvalidConfig("OCR language must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How the four sections are requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GenerationMode {
    /// Four focused prompts (notes, roadmap, resources, Q&A), run
    /// concurrently. A failure in one section leaves the others intact.
    #[default]
    PerSection,
    /// One master prompt whose answer is split by section headings. Cheaper,
    /// but a single failure loses everything and headings may be missed.
    Combined,
}

/// Which OCR engine reads scanned PDFs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcrBackend {
    /// The `tesseract` command-line program.
    #[default]
    Tesseract,
    /// The configured multimodal LLM.
    Vision,
    /// No OCR; scanned PDFs are rejected.
    Disabled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PackConfig::default();
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.api_timeout_secs, 180);
        assert_eq!(c.mode, GenerationMode::PerSection);
        assert_eq!(c.ocr, OcrBackend::Tesseract);
        assert_eq!(c.ocr_max_pages, 10);
        assert_eq!(c.min_response_chars, 100);
    }

    #[test]
    fn builder_clamps() {
        let c = PackConfig::builder()
            .temperature(5.0)
            .concurrency(0)
            .max_rendered_pixels(3)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.max_rendered_pixels, 100);
    }

    #[test]
    fn builder_rejects_zero_ocr_pages() {
        assert!(PackConfig::builder().ocr_max_pages(0).build().is_err());
        assert!(PackConfig::builder().api_timeout_secs(0).build().is_err());
    }

    #[test]
    fn debug_hides_provider() {
        let s = format!("{:?}", PackConfig::default());
        assert!(s.contains("PackConfig"));
        assert!(s.contains("provider: None"));
    }
}
