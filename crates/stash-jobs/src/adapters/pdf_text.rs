//! PdfText extraction adapter: extracts text from PDFs using `pdftotext` (poppler-utils).

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::process::Command;
use tracing::warn;

use stash_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use stash_core::{DocumentFormat, Error, ExtractionAdapter, ExtractionResult, Result};

use super::{run_cmd_with_timeout, write_temp};

/// Adapter for extracting text from PDF files using `pdftotext`.
///
/// Document metadata comes from `pdfinfo` when available; a `pdfinfo`
/// failure is logged and extraction continues without it.
pub struct PdfTextAdapter;

/// Parse `pdfinfo` output into a JSON metadata object.
fn parse_pdfinfo(output: &str) -> JsonValue {
    let mut metadata = serde_json::Map::new();

    for line in output.lines() {
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_lowercase().replace(' ', "_");
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            if key == "pages" {
                if let Ok(pages) = value.parse::<u64>() {
                    metadata.insert(key, JsonValue::Number(pages.into()));
                    continue;
                }
            }
            metadata.insert(key, JsonValue::String(value.to_string()));
        }
    }

    JsonValue::Object(metadata)
}

#[async_trait]
impl ExtractionAdapter for PdfTextAdapter {
    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Pdf]
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        _format: DocumentFormat,
    ) -> Result<ExtractionResult> {
        if data.is_empty() {
            return Err(Error::InvalidInput(
                "Cannot extract text from empty PDF data".to_string(),
            ));
        }

        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::InvalidInput(format!(
                "File '{}' is not a valid PDF (missing %PDF header)",
                filename
            )));
        }

        let tmpfile = write_temp(data, "pdf")?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        let mut metadata = match run_cmd_with_timeout(
            Command::new("pdfinfo").arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await
        {
            Ok(output) => parse_pdfinfo(&output),
            Err(e) => {
                warn!(filename, error = %e, "pdfinfo failed, continuing without metadata");
                serde_json::json!({})
            }
        };

        let text = run_cmd_with_timeout(
            Command::new("pdftotext").arg(&tmp_path).arg("-"),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        if let Some(obj) = metadata.as_object_mut() {
            obj.insert(
                "char_count".to_string(),
                JsonValue::Number(text.chars().count().into()),
            );
        }

        Ok(ExtractionResult {
            extracted_text: Some(text),
            metadata,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match Command::new("pdftotext").arg("-v").output().await {
            // pdftotext -v exits with 0 or 99 depending on the poppler version.
            Ok(output) => Ok(output.status.success() || output.status.code() == Some(99)),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "pdf_text"
    }
}
