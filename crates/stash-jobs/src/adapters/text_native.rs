//! TextNative extraction adapter - handles plain text and Markdown files.

use async_trait::async_trait;

use stash_core::{DocumentFormat, ExtractionAdapter, ExtractionResult, Result};

/// Adapter for extracting content from plain text files.
///
/// Reads bytes as UTF-8 (with lossy conversion for invalid sequences).
pub struct TextNativeAdapter;

#[async_trait]
impl ExtractionAdapter for TextNativeAdapter {
    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Text, DocumentFormat::Markdown]
    }

    async fn extract(
        &self,
        data: &[u8],
        _filename: &str,
        _format: DocumentFormat,
    ) -> Result<ExtractionResult> {
        let text = String::from_utf8_lossy(data).into_owned();
        let char_count = text.chars().count();
        let line_count = text.lines().count();

        Ok(ExtractionResult {
            extracted_text: Some(text),
            metadata: serde_json::json!({
                "char_count": char_count,
                "line_count": line_count,
            }),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "text_native"
    }
}
