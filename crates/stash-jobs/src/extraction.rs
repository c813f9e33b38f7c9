//! Extraction adapter registry for dispatching uploads by document format.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, instrument};

use stash_core::{DocumentFormat, Error, ExtractionAdapter, ExtractionResult, Result};

use crate::adapters::{
    OfficeConvertAdapter, PdfTextAdapter, SpreadsheetConvertAdapter, TextNativeAdapter,
};

/// Registry mapping document formats to their adapter implementations.
pub struct ExtractionRegistry {
    adapters: HashMap<DocumentFormat, Arc<dyn ExtractionAdapter>>,
}

impl ExtractionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Registry with every built-in adapter.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TextNativeAdapter));
        registry.register(Arc::new(PdfTextAdapter));
        registry.register(Arc::new(OfficeConvertAdapter));
        registry.register(Arc::new(SpreadsheetConvertAdapter));
        registry
    }

    /// Register an adapter for every format it handles. Replaces any
    /// existing adapter for those formats.
    pub fn register(&mut self, adapter: Arc<dyn ExtractionAdapter>) {
        for format in adapter.formats() {
            self.adapters.insert(*format, adapter.clone());
        }
        debug!(adapter = adapter.name(), "Registered extraction adapter");
    }

    /// Extract content using the adapter registered for `format`.
    pub async fn extract(
        &self,
        format: DocumentFormat,
        data: &[u8],
        filename: &str,
    ) -> Result<ExtractionResult> {
        let adapter = self.adapters.get(&format).ok_or_else(|| {
            Error::Extraction(format!(
                "No extraction adapter registered for format: {}",
                format
            ))
        })?;
        adapter.extract(data, filename, format).await
    }

    /// Extract text ready for chunking: line breaks flattened to single
    /// spaces. `None` when the document has no text.
    #[instrument(
        skip(self, data),
        fields(subsystem = "jobs", component = "extraction", op = "extract_text")
    )]
    pub async fn extract_text(
        &self,
        format: DocumentFormat,
        data: &[u8],
        filename: &str,
    ) -> Result<Option<String>> {
        let result = self.extract(format, data, filename).await?;
        let text = result.extracted_text.as_deref().map(flatten_whitespace);
        debug!(
            chars = text.as_ref().map(|t| t.len()).unwrap_or(0),
            "Extraction finished"
        );
        Ok(text.filter(|t| !t.is_empty()))
    }

    /// List all formats that have registered adapters.
    pub fn available_formats(&self) -> Vec<DocumentFormat> {
        self.adapters.keys().copied().collect()
    }

    /// Check if an adapter is registered for the given format.
    pub fn has_adapter(&self, format: DocumentFormat) -> bool {
        self.adapters.contains_key(&format)
    }

    /// Run health checks on all registered adapters, keyed by adapter name.
    pub async fn health_check_all(&self) -> HashMap<String, bool> {
        let mut unique: HashMap<String, Arc<dyn ExtractionAdapter>> = HashMap::new();
        for adapter in self.adapters.values() {
            unique
                .entry(adapter.name().to_string())
                .or_insert_with(|| adapter.clone());
        }
        let checks = unique.into_iter().map(|(name, adapter)| async move {
            let healthy = adapter.health_check().await.unwrap_or(false);
            (name, healthy)
        });
        join_all(checks).await.into_iter().collect()
    }
}

impl Default for ExtractionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Collapse every whitespace run (newlines included) into one space.
pub fn flatten_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_new_is_empty() {
        let registry = ExtractionRegistry::new();
        assert!(registry.available_formats().is_empty());
        assert!(!registry.has_adapter(DocumentFormat::Text));
    }

    #[test]
    fn test_registry_register_covers_all_formats() {
        let mut registry = ExtractionRegistry::new();
        registry.register(Arc::new(TextNativeAdapter));
        assert!(registry.has_adapter(DocumentFormat::Text));
        assert!(registry.has_adapter(DocumentFormat::Markdown));
        assert!(!registry.has_adapter(DocumentFormat::Pdf));
        assert_eq!(registry.available_formats().len(), 2);
    }

    #[test]
    fn test_default_registry_covers_every_format() {
        let registry = ExtractionRegistry::with_defaults();
        for format in [
            DocumentFormat::Pdf,
            DocumentFormat::Doc,
            DocumentFormat::Docx,
            DocumentFormat::Ppt,
            DocumentFormat::Pptx,
            DocumentFormat::Xls,
            DocumentFormat::Xlsx,
            DocumentFormat::Text,
            DocumentFormat::Markdown,
        ] {
            assert!(registry.has_adapter(format), "missing adapter for {}", format);
        }
    }

    #[tokio::test]
    async fn test_registry_extract_missing_adapter() {
        let registry = ExtractionRegistry::new();
        let err = registry
            .extract(DocumentFormat::Pdf, b"data", "test.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[tokio::test]
    async fn test_extract_text_flattens_newlines() {
        let registry = ExtractionRegistry::with_defaults();
        let text = registry
            .extract_text(DocumentFormat::Text, b"line one\nline two\r\n\n  three", "a.txt")
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("line one line two three"));
    }

    #[tokio::test]
    async fn test_extract_text_blank_is_none() {
        let registry = ExtractionRegistry::with_defaults();
        let text = registry
            .extract_text(DocumentFormat::Markdown, b" \n\t ", "blank.md")
            .await
            .unwrap();
        assert!(text.is_none());
    }

    #[tokio::test]
    async fn test_registry_health_check_all_dedupes_by_adapter() {
        let mut registry = ExtractionRegistry::new();
        registry.register(Arc::new(TextNativeAdapter));
        let results = registry.health_check_all().await;
        assert_eq!(results.len(), 1);
        assert!(results["text_native"]);
    }
}
