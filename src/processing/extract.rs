//! Plain-text extraction for uploaded files.
//!
//! The extension of the original file name picks the format: `.txt` is decoded as UTF-8,
//! `.pdf` goes through `pdf-extract`, and `.docx` is read from the `word/document.xml`
//! part of its zip container.

use super::types::UploadedFile;
use regex::Regex;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::LazyLock;
use thiserror::Error;

/// Errors raised while extracting text from an upload.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The file extension is not one of the supported formats.
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    /// The file claims a supported format but its content cannot be read.
    #[error("Failed to extract text from {kind} file: {message}")]
    Unreadable {
        /// Format the extractor attempted.
        kind: FileKind,
        /// Description of the failure.
        message: String,
    },
    /// The extraction task stopped before producing a result.
    #[error("Text extraction aborted: {0}")]
    Aborted(String),
}

/// Supported upload formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Portable Document Format.
    Pdf,
    /// Office Open XML word-processing document.
    Docx,
    /// UTF-8 plain text.
    Txt,
}

impl FileKind {
    /// Detect the format from a file name's extension, case-insensitively.
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name).extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Txt => "txt",
        })
    }
}

/// Turns an uploaded file into plain text.
pub trait TextExtractor: Send + Sync {
    /// Extract the full text of `file`.
    fn extract_text(&self, file: &UploadedFile) -> Result<String, ExtractionError>;
}

/// Extractor handling `.txt`, `.pdf`, and `.docx` uploads.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTextExtractor;

impl TextExtractor for DefaultTextExtractor {
    fn extract_text(&self, file: &UploadedFile) -> Result<String, ExtractionError> {
        let kind = FileKind::from_file_name(&file.file_name)
            .ok_or_else(|| ExtractionError::UnsupportedFileType(file.file_name.clone()))?;
        let unreadable = |message: String| ExtractionError::Unreadable { kind, message };

        match kind {
            FileKind::Txt => String::from_utf8(file.bytes.clone())
                .map(|text| text.trim_start_matches('\u{feff}').to_string())
                .map_err(|error| unreadable(error.to_string())),
            FileKind::Pdf => pdf_extract::extract_text_from_mem(&file.bytes)
                .map_err(|error| unreadable(error.to_string())),
            FileKind::Docx => extract_docx(&file.bytes).map_err(unreadable),
        }
    }
}

static PARAGRAPH_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</w:p>|<w:br\s*/>|<w:cr\s*/>").expect("valid regex"));
static TAB: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<w:tab\s*/>").expect("valid regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

fn extract_docx(bytes: &[u8]) -> Result<String, String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(|error| error.to_string())?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|error| error.to_string())?
        .read_to_string(&mut xml)
        .map_err(|error| error.to_string())?;
    Ok(docx_xml_to_text(&xml))
}

fn docx_xml_to_text(xml: &str) -> String {
    let text = PARAGRAPH_END.replace_all(xml, "\n");
    let text = TAB.replace_all(&text, "\t");
    let text = TAG.replace_all(&text, "");
    decode_xml_entities(&text)
}

fn decode_xml_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn upload(file_name: &str, bytes: &[u8]) -> UploadedFile {
        UploadedFile {
            file_name: file_name.into(),
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn detects_kind_case_insensitively() {
        assert_eq!(FileKind::from_file_name("Notes.TXT"), Some(FileKind::Txt));
        assert_eq!(FileKind::from_file_name("thesis.pdf"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_file_name("a.b.docx"), Some(FileKind::Docx));
        assert_eq!(FileKind::from_file_name("image.png"), None);
        assert_eq!(FileKind::from_file_name("README"), None);
    }

    #[test]
    fn extracts_plain_text() {
        let text = DefaultTextExtractor
            .extract_text(&upload("notes.txt", "\u{feff}hello  world".as_bytes()))
            .unwrap();
        assert_eq!(text, "hello  world");
    }

    #[test]
    fn rejects_unsupported_extension() {
        let error = DefaultTextExtractor
            .extract_text(&upload("slides.pptx", b"data"))
            .unwrap_err();
        assert!(matches!(error, ExtractionError::UnsupportedFileType(name) if name == "slides.pptx"));
    }

    #[test]
    fn rejects_invalid_utf8_text() {
        let error = DefaultTextExtractor
            .extract_text(&upload("notes.txt", &[0xff, 0xfe, 0xfd]))
            .unwrap_err();
        assert!(matches!(
            error,
            ExtractionError::Unreadable {
                kind: FileKind::Txt,
                ..
            }
        ));
    }

    #[test]
    fn rejects_corrupt_pdf_and_docx() {
        for name in ["broken.pdf", "broken.docx"] {
            let error = DefaultTextExtractor
                .extract_text(&upload(name, b"definitely not a document"))
                .unwrap_err();
            assert!(matches!(error, ExtractionError::Unreadable { .. }), "{name}");
        }
    }

    #[test]
    fn extracts_docx_paragraphs() {
        let xml = r#"<?xml version="1.0"?><w:document><w:body><w:p><w:r><w:t>Data &amp; Systems</w:t></w:r></w:p><w:p><w:r><w:t>Week</w:t><w:tab/><w:t>1</w:t></w:r></w:p></w:body></w:document>"#;
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buffer);
            writer
                .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            writer.write_all(xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }

        let text = DefaultTextExtractor
            .extract_text(&upload("syllabus.docx", buffer.get_ref()))
            .unwrap();
        assert_eq!(text.trim(), "Data & Systems\nWeek\t1");
    }
}
