//! ZIP bundling of the rendered artifacts.

use crate::error::MentorixError;
use crate::output::Artifact;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// File name used for the bundle when the caller does not pick one.
pub const DEFAULT_ARCHIVE_NAME: &str = "Mentorix_Complete_Pack.zip";

/// One deflated `{name}.pdf` entry per artifact, in artifact order.
pub fn bundle_zip(artifacts: &[Artifact]) -> Result<Vec<u8>, MentorixError> {
    let fail = |e: &dyn std::fmt::Display| MentorixError::ArchiveFailed(e.to_string());

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for artifact in artifacts {
        zip.start_file(artifact.file_name(), options)
            .map_err(|e| fail(&e))?;
        zip.write_all(&artifact.pdf).map_err(|e| fail(&e))?;
    }

    let cursor = zip.finish().map_err(|e| fail(&e))?;
    Ok(cursor.into_inner())
}
