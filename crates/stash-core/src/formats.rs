//! Document format detection from uploaded filenames.

use serde::{Deserialize, Serialize};

/// Document formats with a text extraction path.
///
/// Formats outside this table are stored and downloadable but never indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    Doc,
    Docx,
    Ppt,
    Pptx,
    Xls,
    Xlsx,
    Text,
    Markdown,
}

impl DocumentFormat {
    /// Look up a format by file extension (case-insensitive, no leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "ppt" => Some(Self::Ppt),
            "pptx" => Some(Self::Pptx),
            "xls" => Some(Self::Xls),
            "xlsx" => Some(Self::Xlsx),
            "txt" | "text" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// MIME type served when downloading a file of this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Doc => "application/msword",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Ppt => "application/vnd.ms-powerpoint",
            Self::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Self::Xls => "application/vnd.ms-excel",
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Text => "text/plain; charset=utf-8",
            Self::Markdown => "text/markdown; charset=utf-8",
        }
    }

    /// Whether the format is a spreadsheet (extracted through CSV conversion).
    pub fn is_spreadsheet(&self) -> bool {
        matches!(self, Self::Xls | Self::Xlsx)
    }

    /// Whether the bytes are already readable text.
    pub fn is_plain_text(&self) -> bool {
        matches!(self, Self::Text | Self::Markdown)
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Ppt => "ppt",
            Self::Pptx => "pptx",
            Self::Xls => "xls",
            Self::Xlsx => "xlsx",
            Self::Text => "txt",
            Self::Markdown => "md",
        };
        f.write_str(s)
    }
}

/// Split an uploaded filename into (display name, lowercase extension).
///
/// Any directory components are discarded. A name without an extension, or a
/// dotfile such as `.env`, yields an empty extension.
pub fn split_filename(filename: &str) -> (String, String) {
    let base = filename
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or(filename)
        .trim();

    match base.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < base.len() => (
            base[..idx].to_string(),
            base[idx + 1..].to_ascii_lowercase(),
        ),
        _ => (base.to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension_known_formats() {
        assert_eq!(DocumentFormat::from_extension("pdf"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("DOCX"), Some(DocumentFormat::Docx));
        assert_eq!(DocumentFormat::from_extension("pptx"), Some(DocumentFormat::Pptx));
        assert_eq!(DocumentFormat::from_extension("xls"), Some(DocumentFormat::Xls));
        assert_eq!(DocumentFormat::from_extension("txt"), Some(DocumentFormat::Text));
        assert_eq!(DocumentFormat::from_extension("md"), Some(DocumentFormat::Markdown));
    }

    #[test]
    fn test_from_extension_unknown() {
        assert_eq!(DocumentFormat::from_extension("png"), None);
        assert_eq!(DocumentFormat::from_extension(""), None);
    }

    #[test]
    fn test_display_round_trips_through_lookup() {
        for format in [
            DocumentFormat::Pdf,
            DocumentFormat::Doc,
            DocumentFormat::Xlsx,
            DocumentFormat::Text,
            DocumentFormat::Markdown,
        ] {
            assert_eq!(DocumentFormat::from_extension(&format.to_string()), Some(format));
        }
    }

    #[test]
    fn test_format_classification() {
        assert!(DocumentFormat::Xlsx.is_spreadsheet());
        assert!(!DocumentFormat::Docx.is_spreadsheet());
        assert!(DocumentFormat::Markdown.is_plain_text());
        assert!(!DocumentFormat::Pdf.is_plain_text());
        assert_eq!(DocumentFormat::Pdf.mime_type(), "application/pdf");
    }

    #[test]
    fn test_split_filename() {
        assert_eq!(
            split_filename("Quarterly Report.PDF"),
            ("Quarterly Report".to_string(), "pdf".to_string())
        );
        assert_eq!(
            split_filename("archive.tar.gz"),
            ("archive.tar".to_string(), "gz".to_string())
        );
    }

    #[test]
    fn test_split_filename_without_extension() {
        assert_eq!(split_filename("README"), ("README".to_string(), String::new()));
        assert_eq!(split_filename(".env"), (".env".to_string(), String::new()));
        assert_eq!(split_filename("trailing."), ("trailing.".to_string(), String::new()));
    }

    #[test]
    fn test_split_filename_strips_directories() {
        assert_eq!(
            split_filename("../../etc/passwd.txt"),
            ("passwd".to_string(), "txt".to_string())
        );
        assert_eq!(
            split_filename("C:\\Users\\me\\notes.md"),
            ("notes".to_string(), "md".to_string())
        );
    }
}
