//! OCR engines for scanned syllabi.
//!
//! A scanned PDF has no text layer, so its rasterised pages are handed to an
//! [`OcrEngine`]. Two engines ship with the crate: the `tesseract` CLI, and
//! the configured multimodal LLM.

use crate::config::{OcrBackend, PackConfig};
use crate::error::MentorixError;
use crate::pipeline::encode::{png_bytes, to_image_data};
use crate::pipeline::llm::{generate_with_retry, GenerationRequest, TextGenerator};
use crate::prompts::OCR_SYSTEM_PROMPT;
use futures::future::BoxFuture;
use image::DynamicImage;
use std::io::Write;
use std::sync::Arc;
use tracing::debug;

/// Reads the text off one rasterised page.
///
/// `page` is 1-based and only used for logs and errors.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &'static str;

    fn recognize<'a>(
        &'a self,
        page: usize,
        image: &'a DynamicImage,
    ) -> BoxFuture<'a, Result<String, MentorixError>>;
}

/// Runs `tesseract <png> stdout -l <language>` on each page.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    pub binary: String,
    pub language: String,
}

impl TesseractOcr {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: language.into(),
        }
    }
}

impl OcrEngine for TesseractOcr {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn recognize<'a>(
        &'a self,
        page: usize,
        image: &'a DynamicImage,
    ) -> BoxFuture<'a, Result<String, MentorixError>> {
        Box::pin(async move {
            let failed = |detail: String| MentorixError::OcrFailed { page, detail };

            let png = png_bytes(image).map_err(|e| failed(format!("PNG encoding: {e}")))?;

            // Kept alive until tesseract exits; deleted on drop.
            let mut file = tempfile::Builder::new()
                .prefix("mentorix-page-")
                .suffix(".png")
                .tempfile()
                .map_err(|e| failed(format!("temp file: {e}")))?;
            file.write_all(&png)
                .and_then(|_| file.flush())
                .map_err(|e| failed(format!("temp file: {e}")))?;

            let output = tokio::process::Command::new(&self.binary)
                .arg(file.path())
                .arg("stdout")
                .arg("-l")
                .arg(&self.language)
                .output()
                .await
                .map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        failed(format!(
                            "'{}' was not found. Is Tesseract installed and on PATH? \
                             Alternatively use --ocr vision.",
                            self.binary
                        ))
                    } else {
                        failed(format!("could not run '{}': {e}", self.binary))
                    }
                })?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(failed(format!(
                    "'{}' exited with {}: {}",
                    self.binary,
                    output.status,
                    stderr.trim()
                )));
            }

            let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
            debug!("tesseract page {}: {} chars", page, text.len());
            Ok(text)
        })
    }
}

/// Transcribes pages with the configured multimodal LLM.
pub struct VisionOcr {
    generator: Arc<dyn TextGenerator>,
    config: PackConfig,
}

impl VisionOcr {
    pub fn new(generator: Arc<dyn TextGenerator>, config: PackConfig) -> Self {
        Self { generator, config }
    }
}

impl OcrEngine for VisionOcr {
    fn name(&self) -> &'static str {
        "vision"
    }

    fn recognize<'a>(
        &'a self,
        page: usize,
        image: &'a DynamicImage,
    ) -> BoxFuture<'a, Result<String, MentorixError>> {
        Box::pin(async move {
            let image_data = to_image_data(image).map_err(|e| MentorixError::OcrFailed {
                page,
                detail: format!("PNG encoding: {e}"),
            })?;

            let request = GenerationRequest {
                system: Some(OCR_SYSTEM_PROMPT.to_string()),
                prompt: "Transcribe all text on this page.".to_string(),
                images: vec![image_data],
            };

            let label = format!("ocr page {page}");
            let attempted = generate_with_retry(self.generator.as_ref(), &label, &request, &self.config)
                .await
                .map_err(|e| MentorixError::OcrFailed {
                    page,
                    detail: e.to_string(),
                })?;

            Ok(attempted.generation.text.trim().to_string())
        })
    }
}

/// Build the engine selected by `config.ocr`. `Disabled` yields `None`.
///
/// A pre-constructed `config.ocr_engine` wins over the backend choice. The
/// vision engine needs a resolved generator, so provider errors surface
/// here rather than on the first scanned page.
pub fn engine_for(config: &PackConfig) -> Result<Option<Arc<dyn OcrEngine>>, MentorixError> {
    if let Some(ref engine) = config.ocr_engine {
        return Ok(Some(Arc::clone(engine)));
    }
    match config.ocr {
        OcrBackend::Disabled => Ok(None),
        OcrBackend::Tesseract => Ok(Some(Arc::new(TesseractOcr::new(config.ocr_language.clone())))),
        OcrBackend::Vision => {
            let generator = crate::pipeline::llm::resolve_generator(config)?;
            Ok(Some(Arc::new(VisionOcr::new(generator, config.clone()))))
        }
    }
}
