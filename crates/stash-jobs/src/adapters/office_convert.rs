//! OfficeConvertAdapter: converts Word and PowerPoint documents to plain text using pandoc.
//!
//! pandoc reads only the OOXML formats, so legacy `.doc` and `.ppt` uploads
//! are first upconverted to `.docx`/`.pptx` with LibreOffice (`soffice`).

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use tracing::debug;

use stash_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use stash_core::{DocumentFormat, Error, ExtractionAdapter, ExtractionResult, Result};

use super::{binary_available, run_cmd_with_timeout, write_temp};

pub struct OfficeConvertAdapter;

/// pandoc input format for a document format, plus the legacy format it
/// must be upconverted from (if any).
fn pandoc_plan(format: DocumentFormat) -> Option<(&'static str, bool)> {
    match format {
        DocumentFormat::Docx => Some(("docx", false)),
        DocumentFormat::Pptx => Some(("pptx", false)),
        DocumentFormat::Doc => Some(("docx", true)),
        DocumentFormat::Ppt => Some(("pptx", true)),
        _ => None,
    }
}

/// Convert `input` to `target` with LibreOffice, returning the converted path.
pub(crate) async fn soffice_convert(input: &Path, target: &str, outdir: &Path) -> Result<PathBuf> {
    run_cmd_with_timeout(
        Command::new("soffice")
            .arg("--headless")
            .arg("--convert-to")
            .arg(target)
            .arg("--outdir")
            .arg(outdir)
            .arg(input),
        EXTRACTION_CMD_TIMEOUT_SECS,
    )
    .await?;

    let stem = input
        .file_stem()
        .ok_or_else(|| Error::Internal("Temp file has no name".to_string()))?;
    // soffice accepts filter suffixes like "csv:Text - txt - csv"; the file
    // extension is the part before the colon.
    let extension = target.split(':').next().unwrap_or(target);
    let converted = outdir.join(stem).with_extension(extension);
    if !converted.exists() {
        return Err(Error::Extraction(format!(
            "soffice produced no {} output",
            extension
        )));
    }
    Ok(converted)
}

#[async_trait]
impl ExtractionAdapter for OfficeConvertAdapter {
    fn formats(&self) -> &[DocumentFormat] {
        &[
            DocumentFormat::Doc,
            DocumentFormat::Docx,
            DocumentFormat::Ppt,
            DocumentFormat::Pptx,
        ]
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        format: DocumentFormat,
    ) -> Result<ExtractionResult> {
        if data.is_empty() {
            return Err(Error::InvalidInput(
                "Cannot convert empty document".to_string(),
            ));
        }

        let (pandoc_format, upconvert) = pandoc_plan(format).ok_or_else(|| {
            Error::InvalidInput(format!("{} is not an office document format", format))
        })?;

        let tmpfile = write_temp(data, &format.to_string())?;
        let workdir = tempfile::tempdir()
            .map_err(|e| Error::Internal(format!("Failed to create temp dir: {}", e)))?;

        let input = if upconvert {
            debug!(filename, %format, target = pandoc_format, "Upconverting with soffice");
            soffice_convert(tmpfile.path(), pandoc_format, workdir.path()).await?
        } else {
            tmpfile.path().to_path_buf()
        };

        debug!(filename, format = pandoc_format, "Converting with pandoc");

        let text = run_cmd_with_timeout(
            Command::new("pandoc")
                .arg("-f")
                .arg(pandoc_format)
                .arg("-t")
                .arg("plain")
                .arg("--wrap=none")
                .arg(&input),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        Ok(ExtractionResult {
            metadata: json!({
                "source_format": format.to_string(),
                "pandoc_format": pandoc_format,
                "upconverted": upconvert,
                "char_count": text.chars().count(),
            }),
            extracted_text: Some(text),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(binary_available("pandoc", "--version").await)
    }

    fn name(&self) -> &str {
        "office_convert"
    }
}
