//! pdfium access: the text layer of a PDF syllabus, and page rasters for
//! the OCR fallback.
//!
//! pdfium uses thread-local state and is not safe to drive from async code,
//! so the public functions move the work onto `spawn_blocking` threads and
//! bind a fresh `Pdfium` instance there.

use crate::error::MentorixError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Bind pdfium from `lib_dir`, then `PDFIUM_LIB_PATH`, then the system.
fn bind(lib_dir: Option<PathBuf>) -> Result<Pdfium, MentorixError> {
    let lib_dir = lib_dir.or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

    let bindings = match lib_dir {
        Some(dir) => {
            debug!("Binding pdfium from {}", dir.display());
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
        }
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| MentorixError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn open<'a>(
    pdfium: &'a Pdfium,
    name: &str,
    bytes: &'a [u8],
) -> Result<PdfDocument<'a>, MentorixError> {
    pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| MentorixError::CorruptPdf {
            name: name.to_string(),
            detail: format!("{:?}", e),
        })
}

/// Text layer of every page, in page order. Pages without text yield "".
pub async fn page_texts(
    name: &str,
    bytes: &[u8],
    lib_dir: Option<PathBuf>,
) -> Result<Vec<String>, MentorixError> {
    let name = name.to_string();
    let bytes = bytes.to_vec();

    tokio::task::spawn_blocking(move || {
        let pdfium = bind(lib_dir)?;
        let document = open(&pdfium, &name, &bytes)?;

        let mut texts = Vec::new();
        for (idx, page) in document.pages().iter().enumerate() {
            match page.text() {
                Ok(text) => texts.push(text.all()),
                Err(e) => {
                    warn!("Page {}: no text layer ({:?})", idx + 1, e);
                    texts.push(String::new());
                }
            }
        }
        info!("Read text layer of {} pages from '{}'", texts.len(), name);
        Ok(texts)
    })
    .await
    .map_err(|e| MentorixError::Internal(format!("Text extraction task panicked: {}", e)))?
}

/// Rasterise the first `max_pages` pages, longest edge capped at `max_pixels`.
///
/// Returns `(page_index_0based, image)` pairs.
pub async fn rasterise(
    name: &str,
    bytes: &[u8],
    max_pages: usize,
    max_pixels: u32,
    lib_dir: Option<PathBuf>,
) -> Result<Vec<(usize, DynamicImage)>, MentorixError> {
    let name = name.to_string();
    let bytes = bytes.to_vec();

    tokio::task::spawn_blocking(move || {
        let pdfium = bind(lib_dir)?;
        let document = open(&pdfium, &name, &bytes)?;
        let pages = document.pages();
        let total = pages.len() as usize;

        let render_config = PdfRenderConfig::new()
            .set_target_width(max_pixels as i32)
            .set_maximum_height(max_pixels as i32);

        let mut results = Vec::with_capacity(total.min(max_pages));
        for idx in 0..total.min(max_pages) {
            let page = pages
                .get(idx as u16)
                .map_err(|e| MentorixError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                })?;

            let bitmap = page.render_with_config(&render_config).map_err(|e| {
                MentorixError::RasterisationFailed {
                    page: idx + 1,
                    detail: format!("{:?}", e),
                }
            })?;

            let image = bitmap.as_image();
            debug!("Rasterised page {} → {}x{} px", idx + 1, image.width(), image.height());
            results.push((idx, image));
        }

        if total > max_pages {
            info!("OCR limited to the first {} of {} pages", max_pages, total);
        }
        Ok(results)
    })
    .await
    .map_err(|e| MentorixError::Internal(format!("Render task panicked: {}", e)))?
}
