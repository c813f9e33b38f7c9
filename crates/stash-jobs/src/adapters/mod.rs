//! Extraction adapter implementations.
//!
//! Each adapter turns the bytes of one or more [`DocumentFormat`]s into plain
//! text. Adapters backed by external tools (`pdftotext`, `pandoc`, `soffice`)
//! write the upload to a temporary file and run the tool under
//! [`EXTRACTION_CMD_TIMEOUT_SECS`].
//!
//! [`DocumentFormat`]: stash_core::DocumentFormat
//! [`EXTRACTION_CMD_TIMEOUT_SECS`]: stash_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS

pub mod office_convert;
pub mod pdf_text;
pub mod spreadsheet_convert;
pub mod text_native;

pub use office_convert::OfficeConvertAdapter;
pub use pdf_text::PdfTextAdapter;
pub use spreadsheet_convert::SpreadsheetConvertAdapter;
pub use text_native::TextNativeAdapter;

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use tokio::process::Command;

use stash_core::{Error, Result};

/// Run a command with a timeout, returning stdout as a string.
pub(crate) async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let output = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::Extraction(format!("External command timed out after {}s", timeout_secs))
        })?
        .map_err(|e| Error::Extraction(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Extraction(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Write `data` to a named temp file ending in `.{extension}`.
pub(crate) fn write_temp(data: &[u8], extension: &str) -> Result<NamedTempFile> {
    let suffix = format!(".{}", extension);
    let mut tmpfile = tempfile::Builder::new()
        .suffix(&suffix)
        .tempfile()
        .map_err(|e| Error::Internal(format!("Failed to create temp file: {}", e)))?;
    tmpfile
        .write_all(data)
        .map_err(|e| Error::Internal(format!("Failed to write temp file: {}", e)))?;
    Ok(tmpfile)
}

/// Whether a binary answers `<binary> <version_flag>`.
pub(crate) async fn binary_available(binary: &str, version_flag: &str) -> bool {
    match Command::new(binary).arg(version_flag).output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
