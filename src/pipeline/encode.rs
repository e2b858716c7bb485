//! Image encoding for the OCR engines.
//!
//! Tesseract reads a PNG file from disk; vision models take the same PNG as
//! base64 inside the JSON request body. PNG is lossless, which keeps small
//! print legible for both.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// PNG-encode a rasterised page.
pub fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// Wrap a rasterised page as a base64 PNG attachment for a vision model.
///
/// `detail: "high"` keeps fine print readable on models that tile images.
pub fn to_image_data(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let b64 = STANDARD.encode(png_bytes(img)?);
    debug!("Encoded page image → {} bytes base64", b64.len());
    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn white_page() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 12, Rgba([255, 255, 255, 255])))
    }

    #[test]
    fn png_has_signature() {
        let bytes = png_bytes(&white_page()).unwrap();
        assert!(bytes.starts_with(&[0x89, b'P', b'N', b'G']));
    }

    #[test]
    fn image_data_round_trips_base64() {
        let data = to_image_data(&white_page()).unwrap();
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert!(decoded.starts_with(&[0x89, b'P', b'N', b'G']));
    }
}
