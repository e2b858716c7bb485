//! Input resolution: turn a user-supplied path or URL into syllabus bytes,
//! and work out which format those bytes are in.
//!
//! Syllabi are small (a few hundred KB at most), so both local files and
//! downloads are read fully into memory. The extractor works on byte slices
//! and never needs a path.

use crate::error::MentorixError;
use std::path::PathBuf;
use tracing::{debug, info};

/// A syllabus loaded into memory.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// File name (for URLs, the last path segment).
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Supported syllabus formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Txt,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a syllabus from a local path or an HTTP(S) URL.
pub async fn resolve_source(input: &str, timeout_secs: u64) -> Result<SourceDocument, MentorixError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(MentorixError::InvalidInput("syllabus path is empty".into()));
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

async fn read_local(path_str: &str) -> Result<SourceDocument, MentorixError> {
    let path = PathBuf::from(path_str);

    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => MentorixError::PermissionDenied { path: path.clone() },
        _ => MentorixError::FileNotFound { path: path.clone() },
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());

    debug!("Read local syllabus {} ({} bytes)", path.display(), bytes.len());
    Ok(SourceDocument { name, bytes })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, MentorixError> {
    info!("Downloading syllabus from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| MentorixError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            MentorixError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            MentorixError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(MentorixError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(|e| MentorixError::DownloadFailed {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    info!("Downloaded {} bytes", bytes.len());
    Ok(SourceDocument {
        name: filename_from_url(url),
        bytes: bytes.to_vec(),
    })
}

/// Last URL path segment if it looks like a file name, else `downloaded.txt`.
fn filename_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| !last.is_empty() && last.contains('.'))
        .unwrap_or_else(|| "downloaded.txt".to_string())
}

/// Decide the format of a syllabus.
///
/// PDF and ZIP signatures win over the extension, since download names are
/// often guessed. Otherwise the extension decides, then UTF-8 validity.
pub fn sniff_format(name: &str, bytes: &[u8]) -> Result<DocumentFormat, MentorixError> {
    if let Some(format) = magic_format(bytes) {
        debug!("Sniffed {:?} from content of '{}'", format, name);
        return Ok(format);
    }

    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => Ok(DocumentFormat::Pdf),
        "docx" => Ok(DocumentFormat::Docx),
        "txt" => Ok(DocumentFormat::Txt),
        _ if !bytes.is_empty() && std::str::from_utf8(bytes).is_ok() => Ok(DocumentFormat::Txt),
        _ => Err(MentorixError::UnsupportedFormat { extension }),
    }
}

fn magic_format(bytes: &[u8]) -> Option<DocumentFormat> {
    if bytes.starts_with(b"%PDF") {
        Some(DocumentFormat::Pdf)
    } else if bytes.starts_with(b"PK\x03\x04") {
        Some(DocumentFormat::Docx)
    } else {
        None
    }
}
