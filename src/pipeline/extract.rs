//! Text extraction from syllabus documents.
//!
//! | Format | Method |
//! |--------|--------|
//! | TXT    | lossy UTF-8 decode |
//! | DOCX   | `word/document.xml` runs, one line per paragraph |
//! | PDF    | pdfium text layer, OCR of the first pages when it is empty |

use crate::config::PackConfig;
use crate::error::MentorixError;
use crate::pipeline::input::{sniff_format, DocumentFormat, SourceDocument};
use crate::pipeline::ocr::{engine_for, OcrEngine};
use crate::pipeline::pdfium;
use image::DynamicImage;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::future::Future;
use std::io::{Cursor, Read};
use tracing::{debug, info, warn};
use zip::ZipArchive;

const EMPTY_PDF: &str =
    "PDF appears to be empty or corrupted. Please ensure it contains readable text or images.";

/// How the text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ExtractionMethod {
    TextLayer,
    Ocr,
    Plain,
    Docx,
}

/// Text pulled out of a syllabus.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ExtractedText {
    pub text: String,
    pub format: DocumentFormat,
    pub method: ExtractionMethod,
    /// Pages read (PDF only; 0 for TXT and DOCX).
    pub pages: usize,
}

/// Extract trimmed plain text from `doc`.
pub async fn extract_text(
    doc: &SourceDocument,
    config: &PackConfig,
) -> Result<ExtractedText, MentorixError> {
    let format = sniff_format(&doc.name, &doc.bytes)?;
    info!("Extracting text from '{}' ({:?})", doc.name, format);

    let extracted = match format {
        DocumentFormat::Txt => ExtractedText {
            text: extract_txt(&doc.bytes)?,
            format,
            method: ExtractionMethod::Plain,
            pages: 0,
        },
        DocumentFormat::Docx => ExtractedText {
            text: extract_docx(&doc.bytes)?,
            format,
            method: ExtractionMethod::Docx,
            pages: 0,
        },
        DocumentFormat::Pdf => extract_pdf(doc, config).await?,
    };

    info!(
        "Extracted {} chars via {:?}",
        extracted.text.chars().count(),
        extracted.method
    );
    Ok(extracted)
}

/// Decode plain text, dropping invalid UTF-8 sequences.
pub fn extract_txt(bytes: &[u8]) -> Result<String, MentorixError> {
    let text: String = String::from_utf8_lossy(bytes)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect();
    let text = text.trim();
    if text.is_empty() {
        return Err(MentorixError::EmptyDocument("TXT file is empty".into()));
    }
    Ok(text.to_string())
}

/// Paragraph text of a DOCX file, one paragraph per line.
pub fn extract_docx(bytes: &[u8]) -> Result<String, MentorixError> {
    let docx_err = |detail: String| MentorixError::Docx { detail };

    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| docx_err(format!("not a ZIP container: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|e| match e {
            zip::result::ZipError::FileNotFound => docx_err("missing part word/document.xml".into()),
            other => docx_err(other.to_string()),
        })?
        .read_to_string(&mut xml)
        .map_err(|e| docx_err(format!("reading word/document.xml: {e}")))?;

    let paragraphs = docx_paragraphs(&xml).map_err(docx_err)?;
    let text = paragraphs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    if text.is_empty() {
        return Err(MentorixError::EmptyDocument("No text found in DOCX".into()));
    }
    debug!("DOCX: {} paragraphs", paragraphs.len());
    Ok(text)
}

/// Collect the `w:t` runs of each `w:p`. Text outside paragraphs is ignored.
fn docx_paragraphs(xml: &str) -> Result<Vec<String>, String> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:p" => current = Some(String::new()),
                b"w:t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if let Some(ref mut para) = current {
                    match e.name().as_ref() {
                        b"w:tab" => para.push('\t'),
                        b"w:br" | b"w:cr" => para.push('\n'),
                        _ => {}
                    }
                }
            }
            Ok(Event::Text(t)) if in_text => {
                if let Some(ref mut para) = current {
                    let text = t.unescape().map_err(|e| format!("bad XML text: {e}"))?;
                    para.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => {
                    if let Some(para) = current.take() {
                        paragraphs.push(para);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(format!(
                    "malformed word/document.xml at byte {}: {e}",
                    reader.error_position()
                ))
            }
            _ => {}
        }
    }

    Ok(paragraphs)
}

async fn extract_pdf(
    doc: &SourceDocument,
    config: &PackConfig,
) -> Result<ExtractedText, MentorixError> {
    let layer = pdfium::page_texts(&doc.name, &doc.bytes, config.pdfium_lib_path.clone()).await;

    pdf_text_or_ocr(&doc.name, layer, config, || {
        pdfium::rasterise(
            &doc.name,
            &doc.bytes,
            config.ocr_max_pages,
            config.max_rendered_pixels,
            config.pdfium_lib_path.clone(),
        )
    })
    .await
}

/// Use the text layer when it has text, otherwise OCR the pages produced by
/// `rasterise`.
async fn pdf_text_or_ocr<F, Fut>(
    name: &str,
    layer: Result<Vec<String>, MentorixError>,
    config: &PackConfig,
    rasterise: F,
) -> Result<ExtractedText, MentorixError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<(usize, DynamicImage)>, MentorixError>>,
{
    match layer {
        Ok(pages) => {
            let page_count = pages.len();
            let text = join_non_empty(pages);
            if !text.is_empty() {
                return Ok(ExtractedText {
                    text,
                    format: DocumentFormat::Pdf,
                    method: ExtractionMethod::TextLayer,
                    pages: page_count,
                });
            }
            info!("'{}' has no text layer; falling back to OCR", name);
        }
        // Without pdfium there is no way to rasterise either.
        Err(e @ MentorixError::PdfiumBindingFailed(_)) => return Err(e),
        Err(e) => warn!("Text layer extraction failed, trying OCR: {}", e),
    }

    let engine = match engine_for(config)? {
        Some(engine) => engine,
        None => {
            warn!("OCR is disabled; cannot read scanned PDF '{}'", name);
            return Err(MentorixError::EmptyDocument(EMPTY_PDF.into()));
        }
    };

    let recognised = match rasterise().await {
        Ok(images) => ocr_pages(&images, engine.as_ref()).await,
        Err(e) => Err(e),
    };
    match recognised {
        Ok((text, pages)) if !text.is_empty() => Ok(ExtractedText {
            text,
            format: DocumentFormat::Pdf,
            method: ExtractionMethod::Ocr,
            pages,
        }),
        Ok(_) => Err(MentorixError::EmptyDocument(EMPTY_PDF.into())),
        Err(e) => {
            warn!("OCR of '{}' failed: {}", name, e);
            Err(MentorixError::EmptyDocument(EMPTY_PDF.into()))
        }
    }
}

/// OCR rasterised pages one at a time.
async fn ocr_pages(
    images: &[(usize, DynamicImage)],
    engine: &dyn OcrEngine,
) -> Result<(String, usize), MentorixError> {
    info!("Running {} OCR on {} pages", engine.name(), images.len());
    let mut texts = Vec::with_capacity(images.len());
    for (idx, image) in images {
        texts.push(engine.recognize(idx + 1, image).await?);
    }
    Ok((join_non_empty(texts), images.len()))
}

fn join_non_empty(pages: Vec<String>) -> String {
    pages
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OcrBackend;
    use futures::future::BoxFuture;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn docx_with(document_xml: &str) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        zip.start_file("[Content_Types].xml", options).unwrap();
        zip.write_all(b"<Types/>").unwrap();
        zip.start_file("word/document.xml", options).unwrap();
        zip.write_all(document_xml.as_bytes()).unwrap();
        zip.finish().unwrap().into_inner()
    }

    const BODY: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>Unit 1:</w:t></w:r><w:r><w:t xml:space="preserve"> Sets &amp; Relations</w:t></w:r></w:p>
    <w:p><w:r><w:t></w:t></w:r></w:p>
    <w:p><w:r><w:t>Topics</w:t><w:tab/><w:t>Hours</w:t></w:r></w:p>
    <w:p><w:r><w:t>Line one</w:t><w:br/><w:t>Line two</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn txt_is_trimmed() {
        assert_eq!(extract_txt(b"  Unit 1: Graphs\n\n").unwrap(), "Unit 1: Graphs");
    }

    #[test]
    fn txt_drops_invalid_utf8() {
        assert_eq!(extract_txt(b"Gr\xffaphs").unwrap(), "Graphs");
    }

    #[test]
    fn blank_txt_is_empty_document() {
        let err = extract_txt(b" \n\t ").unwrap_err();
        assert_eq!(err.to_string(), "TXT file is empty");
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let text = extract_docx(&docx_with(BODY)).unwrap();
        assert_eq!(
            text,
            "Unit 1: Sets & Relations\nTopics\tHours\nLine one\nLine two"
        );
    }

    #[test]
    fn docx_without_text() {
        let xml = r#"<w:document xmlns:w="x"><w:body><w:p/><w:p><w:r/></w:p></w:body></w:document>"#;
        let err = extract_docx(&docx_with(xml)).unwrap_err();
        assert_eq!(err.to_string(), "No text found in DOCX");
    }

    #[test]
    fn docx_missing_document_part() {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("readme.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"hi").unwrap();
        let bytes = zip.finish().unwrap().into_inner();

        let err = extract_docx(&bytes).unwrap_err();
        assert!(matches!(err, MentorixError::Docx { .. }), "got: {err:?}");
        assert!(err.to_string().contains("word/document.xml"));
    }

    #[test]
    fn docx_rejects_non_zip() {
        let err = extract_docx(b"definitely not a zip").unwrap_err();
        assert!(matches!(err, MentorixError::Docx { .. }));
    }

    #[tokio::test]
    async fn extract_text_dispatches_on_format() {
        let config = PackConfig::default();

        let txt = SourceDocument {
            name: "syllabus.txt".into(),
            bytes: b"Unit 2: Trees".to_vec(),
        };
        let out = extract_text(&txt, &config).await.unwrap();
        assert_eq!(out.method, ExtractionMethod::Plain);
        assert_eq!(out.text, "Unit 2: Trees");

        let docx = SourceDocument {
            name: "syllabus.docx".into(),
            bytes: docx_with(BODY),
        };
        let out = extract_text(&docx, &config).await.unwrap();
        assert_eq!(out.format, DocumentFormat::Docx);
        assert!(out.text.starts_with("Unit 1: Sets & Relations"));
    }

    #[test]
    fn join_skips_blank_pages() {
        let joined = join_non_empty(vec!["a".into(), "  ".into(), "b\n".into()]);
        assert_eq!(joined, "a\nb");
    }

    /// Returns `text` for every page, or fails when `text` is `None`.
    struct ScriptedOcr {
        text: Option<&'static str>,
        pages_seen: AtomicUsize,
    }

    impl ScriptedOcr {
        fn config(text: Option<&'static str>) -> (Arc<ScriptedOcr>, PackConfig) {
            let engine = Arc::new(ScriptedOcr {
                text,
                pages_seen: AtomicUsize::new(0),
            });
            let config = PackConfig::builder()
                .ocr_engine(Arc::clone(&engine) as Arc<dyn OcrEngine>)
                .build()
                .unwrap();
            (engine, config)
        }
    }

    impl OcrEngine for ScriptedOcr {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn recognize<'a>(
            &'a self,
            page: usize,
            _image: &'a DynamicImage,
        ) -> BoxFuture<'a, Result<String, MentorixError>> {
            Box::pin(async move {
                self.pages_seen.fetch_add(1, Ordering::SeqCst);
                match self.text {
                    Some(text) => Ok(format!("{text} (page {page})")),
                    None => Err(MentorixError::OcrFailed {
                        page,
                        detail: "engine crashed".into(),
                    }),
                }
            })
        }
    }

    async fn two_scans() -> Result<Vec<(usize, DynamicImage)>, MentorixError> {
        Ok(vec![
            (0, DynamicImage::new_rgb8(8, 8)),
            (1, DynamicImage::new_rgb8(8, 8)),
        ])
    }

    #[tokio::test]
    async fn text_layer_skips_ocr() {
        let (engine, config) = ScriptedOcr::config(Some("unused"));
        let layer = Ok(vec!["Unit 1: Graphs".to_string(), " ".to_string()]);
        let out = pdf_text_or_ocr("s.pdf", layer, &config, two_scans).await.unwrap();
        assert_eq!(out.method, ExtractionMethod::TextLayer);
        assert_eq!(out.pages, 2);
        assert_eq!(out.text, "Unit 1: Graphs");
        assert_eq!(engine.pages_seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_text_layer_falls_back_to_ocr() {
        let (engine, config) = ScriptedOcr::config(Some("Unit 3: Hashing"));
        let layer = Ok(vec![String::new(), "  \n".to_string()]);
        let out = pdf_text_or_ocr("scan.pdf", layer, &config, two_scans).await.unwrap();
        assert_eq!(out.method, ExtractionMethod::Ocr);
        assert_eq!(out.format, DocumentFormat::Pdf);
        assert_eq!(out.pages, 2);
        assert_eq!(out.text, "Unit 3: Hashing (page 1)\nUnit 3: Hashing (page 2)");
        assert_eq!(engine.pages_seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn broken_text_layer_falls_back_to_ocr() {
        let (_, config) = ScriptedOcr::config(Some("Unit 4"));
        let layer = Err(MentorixError::CorruptPdf {
            name: "scan.pdf".into(),
            detail: "bad xref".into(),
        });
        let out = pdf_text_or_ocr("scan.pdf", layer, &config, two_scans).await.unwrap();
        assert_eq!(out.method, ExtractionMethod::Ocr);
    }

    #[tokio::test]
    async fn failed_ocr_is_empty_document() {
        let (engine, config) = ScriptedOcr::config(None);
        let err = pdf_text_or_ocr("scan.pdf", Ok(vec![]), &config, two_scans)
            .await
            .unwrap_err();
        assert!(matches!(err, MentorixError::EmptyDocument(_)), "got: {err:?}");
        assert!(err.to_string().contains("empty or corrupted"));
        assert_eq!(engine.pages_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_ocr_is_empty_document() {
        let (_, config) = ScriptedOcr::config(Some(""));
        let no_pages = || async { Ok::<_, MentorixError>(Vec::<(usize, DynamicImage)>::new()) };
        let err = pdf_text_or_ocr("scan.pdf", Ok(vec![]), &config, no_pages)
            .await
            .unwrap_err();
        assert!(matches!(err, MentorixError::EmptyDocument(_)));
    }

    #[tokio::test]
    async fn disabled_ocr_is_empty_document() {
        let config = PackConfig::builder().ocr(OcrBackend::Disabled).build().unwrap();
        let err = pdf_text_or_ocr("scan.pdf", Ok(vec![String::new()]), &config, two_scans)
            .await
            .unwrap_err();
        assert!(matches!(err, MentorixError::EmptyDocument(_)));
    }

    #[tokio::test]
    async fn missing_pdfium_is_not_masked() {
        let (engine, config) = ScriptedOcr::config(Some("unused"));
        let layer = Err(MentorixError::PdfiumBindingFailed("libpdfium.so not found".into()));
        let err = pdf_text_or_ocr("scan.pdf", layer, &config, two_scans)
            .await
            .unwrap_err();
        assert!(matches!(err, MentorixError::PdfiumBindingFailed(_)));
        assert_eq!(engine.pages_seen.load(Ordering::SeqCst), 0);
    }
}
