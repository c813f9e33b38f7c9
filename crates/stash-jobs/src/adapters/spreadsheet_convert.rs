//! SpreadsheetConvertAdapter: renders Excel workbooks as CSV text using LibreOffice.
//!
//! Only the first sheet is converted, and only the first rows are kept for
//! indexing. The leading rows carry the header and enough sample data to
//! describe the sheet.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use stash_core::{DocumentFormat, Error, ExtractionAdapter, ExtractionResult, Result};

use super::office_convert::soffice_convert;
use super::{binary_available, write_temp};

/// Rows (header included) kept from the converted sheet.
pub const PREVIEW_ROWS: usize = 6;

pub struct SpreadsheetConvertAdapter;

#[async_trait]
impl ExtractionAdapter for SpreadsheetConvertAdapter {
    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Xls, DocumentFormat::Xlsx]
    }

    async fn extract(
        &self,
        data: &[u8],
        filename: &str,
        format: DocumentFormat,
    ) -> Result<ExtractionResult> {
        if data.is_empty() {
            return Err(Error::InvalidInput(
                "Cannot convert empty spreadsheet".to_string(),
            ));
        }
        if !format.is_spreadsheet() {
            return Err(Error::InvalidInput(format!(
                "{} is not a spreadsheet format",
                format
            )));
        }

        let tmpfile = write_temp(data, &format.to_string())?;
        let workdir = tempfile::tempdir()
            .map_err(|e| Error::Internal(format!("Failed to create temp dir: {}", e)))?;

        debug!(filename, %format, "Converting sheet to csv with soffice");
        let csv_path = soffice_convert(tmpfile.path(), "csv", workdir.path()).await?;
        let csv = tokio::fs::read(&csv_path).await?;
        let csv = String::from_utf8_lossy(&csv);

        let (text, total_rows) = preview_rows(&csv, PREVIEW_ROWS);

        Ok(ExtractionResult {
            extracted_text: Some(text),
            metadata: json!({
                "source_format": format.to_string(),
                "total_rows": total_rows,
                "preview_rows": total_rows.min(PREVIEW_ROWS),
            }),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(binary_available("soffice", "--version").await)
    }

    fn name(&self) -> &str {
        "spreadsheet_convert"
    }
}

/// First `limit` non-empty lines of `csv`, and the total count of non-empty lines.
fn preview_rows(csv: &str, limit: usize) -> (String, usize) {
    let rows: Vec<&str> = csv.lines().filter(|l| !l.trim().is_empty()).collect();
    let total = rows.len();
    (rows.into_iter().take(limit).collect::<Vec<_>>().join("\n"), total)
}
