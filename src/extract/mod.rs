//! Text and metadata extraction for uploaded files and Drive guideline files.

pub mod docx;
pub mod guidelines;
pub mod pdf;
pub mod raster;
pub mod text;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

pub use guidelines::{extract_guidelines, render_guidelines, BrandGuidelines, GuidelineKind};

pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const LEGACY_DOC_MIME: &str = "application/msword";

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Unsupported file type: {0}")]
    Unsupported(String),
    #[error("No text content could be extracted from the file")]
    Empty,
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Drive(#[from] crate::drive::DriveError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedContent {
    pub text: String,
    pub metadata: ContentMetadata,
    pub raw_data: Value,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    pub word_count: usize,
    pub character_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extracted_images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_sizes: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_families: Option<Vec<String>>,
}

impl ContentMetadata {
    fn for_text(text: &str) -> Self {
        Self {
            word_count: word_count(text),
            character_count: character_count(text),
            ..Self::default()
        }
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub fn character_count(text: &str) -> usize {
    text.chars().count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Image,
    Pdf,
    Docx,
    LegacyDoc,
    Text,
}

#[derive(Clone, Copy)]
enum MimeMatch {
    Exact(&'static str),
    Prefix(&'static str),
}

impl MimeMatch {
    fn matches(self, mime: &str) -> bool {
        match self {
            MimeMatch::Exact(expected) => mime == expected,
            MimeMatch::Prefix(prefix) => mime.starts_with(prefix),
        }
    }
}

/// Checked in order; the first rule whose MIME or extension matches wins.
const UPLOAD_RULES: &[(MimeMatch, Option<&str>, UploadKind)] = &[
    (MimeMatch::Prefix("image/"), None, UploadKind::Image),
    (MimeMatch::Exact("application/pdf"), None, UploadKind::Pdf),
    (MimeMatch::Exact(DOCX_MIME), Some("docx"), UploadKind::Docx),
    (
        MimeMatch::Exact(LEGACY_DOC_MIME),
        Some("doc"),
        UploadKind::LegacyDoc,
    ),
    (MimeMatch::Prefix("text/"), Some("txt"), UploadKind::Text),
];

impl UploadKind {
    pub fn detect(mime_type: &str, filename: &str) -> Option<Self> {
        let mime = mime_type.to_ascii_lowercase();
        let extension = file_extension(filename);
        UPLOAD_RULES
            .iter()
            .find(|(mime_match, ext, _)| {
                mime_match.matches(&mime)
                    || matches!((ext, extension.as_deref()), (Some(a), Some(b)) if *a == b)
            })
            .map(|(_, _, kind)| *kind)
    }
}

/// Lower-cased extension without the dot.
pub fn file_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_ascii_lowercase())
}

/// MIME type sent by the client, or one guessed from the file name.
pub fn resolve_mime_type(declared: Option<&str>, filename: &str) -> String {
    match declared.map(str::trim).filter(|value| !value.is_empty()) {
        Some(mime) => mime.to_ascii_lowercase(),
        None => mime_guess::from_path(filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// Extracts an uploaded file. CPU bound; run it on the blocking pool.
pub fn extract_upload(
    filename: &str,
    mime_type: &str,
    bytes: &[u8],
) -> Result<ExtractedContent, ExtractError> {
    let kind = UploadKind::detect(mime_type, filename)
        .ok_or_else(|| ExtractError::Unsupported(mime_type.to_string()))?;
    debug!(filename, mime_type, ?kind, "extracting upload");

    match kind {
        UploadKind::Image => Ok(extract_image(filename, mime_type, bytes)),
        UploadKind::Pdf => Ok(extract_pdf(filename, bytes)),
        UploadKind::Docx => extract_docx(bytes),
        UploadKind::LegacyDoc => Err(ExtractError::Failed(
            "Legacy .doc format not fully supported. Please convert to .docx format.".into(),
        )),
        UploadKind::Text => {
            let text = text::decode_lossy(bytes);
            Ok(ExtractedContent {
                metadata: ContentMetadata::for_text(&text),
                text,
                raw_data: json!({}),
            })
        }
    }
}

fn extract_image(filename: &str, mime_type: &str, bytes: &[u8]) -> ExtractedContent {
    let text = format!(
        "[Image Content - {filename}]\nThis image was uploaded for brand compliance analysis. \
         The system will analyze visual elements and any text content for brand guideline compliance."
    );

    let colors = raster::dominant_colors(bytes, raster::MAX_COLORS).unwrap_or_else(|err| {
        warn!(filename, error = %err, "could not extract image colors");
        raster::FALLBACK_COLORS.iter().map(|c| c.to_string()).collect()
    });

    let image_metadata = match raster::read_info(bytes) {
        Ok(info) => json!({
            "width": info.width,
            "height": info.height,
            "format": info.format,
        }),
        Err(err) => {
            warn!(filename, error = %err, "could not read image metadata");
            json!({
                "width": 0,
                "height": 0,
                "format": mime_type.split('/').nth(1).unwrap_or("unknown"),
                "note": "Image metadata extraction unavailable",
            })
        }
    };

    ExtractedContent {
        metadata: ContentMetadata {
            language: Some("eng".into()),
            colors: Some(colors),
            extracted_images: Some(vec![filename.to_string()]),
            ..ContentMetadata::for_text(&text)
        },
        text,
        raw_data: json!({
            "confidence": 0,
            "imageMetadata": image_metadata,
            "ocrAvailable": false,
        }),
    }
}

fn extract_pdf(filename: &str, bytes: &[u8]) -> ExtractedContent {
    match pdf::read_pdf(bytes) {
        Ok(parsed) => ExtractedContent {
            metadata: ContentMetadata {
                page_count: Some(parsed.page_count.max(1)),
                extracted_images: Some(Vec::new()),
                ..ContentMetadata::for_text(&parsed.text)
            },
            text: parsed.text,
            raw_data: json!({
                "filename": filename,
                "type": "pdf",
                "size": bytes.len(),
                "parsingMethod": "pdfium",
            }),
        },
        Err(err) => {
            warn!(filename, error = %err, "pdf parsing failed; using fallback text");
            let text = format!(
                "[PDF Content - {filename}]\nThis PDF file could not be fully parsed due to technical \
                 limitations. The system will analyze this document for brand compliance using \
                 available metadata and general document guidelines."
            );
            ExtractedContent {
                metadata: ContentMetadata {
                    page_count: Some(1),
                    extracted_images: Some(Vec::new()),
                    ..ContentMetadata::for_text(&text)
                },
                text,
                raw_data: json!({
                    "filename": filename,
                    "type": "pdf",
                    "size": bytes.len(),
                    "error": err,
                    "parsingMethod": "fallback",
                }),
            }
        }
    }
}

fn extract_docx(bytes: &[u8]) -> Result<ExtractedContent, ExtractError> {
    if bytes.is_empty() {
        return Err(ExtractError::Failed(
            "Failed to parse DOCX: Empty DOCX file received".into(),
        ));
    }

    let parsed = docx::read_docx(bytes)
        .map_err(|err| ExtractError::Failed(format!("Failed to parse DOCX: {err}")))?;
    if parsed.text.trim().is_empty() {
        return Err(ExtractError::Failed(
            "Failed to parse DOCX: DOCX file appears to be empty or contains no extractable text"
                .into(),
        ));
    }

    Ok(ExtractedContent {
        metadata: ContentMetadata {
            font_families: Some(parsed.font_families),
            font_sizes: Some(parsed.font_sizes),
            extracted_images: Some(Vec::new()),
            ..ContentMetadata::for_text(&parsed.text)
        },
        raw_data: json!({
            "paragraphs": parsed.paragraphs,
            "parsingMethod": "docx-xml",
        }),
        text: parsed.text,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_words_and_characters() {
        assert_eq!(word_count("Hello world"), 2);
        assert_eq!(character_count("Hello world"), 11);
        assert_eq!(word_count("  spaced \n\t out  "), 2);
        assert_eq!(character_count("café"), 4);
    }

    #[test]
    fn detects_kinds_by_mime_then_extension() {
        assert_eq!(UploadKind::detect("image/PNG", "logo"), Some(UploadKind::Image));
        assert_eq!(
            UploadKind::detect("application/pdf", "deck.pdf"),
            Some(UploadKind::Pdf)
        );
        assert_eq!(
            UploadKind::detect("application/octet-stream", "copy.DOCX"),
            Some(UploadKind::Docx)
        );
        assert_eq!(
            UploadKind::detect("text/plain", "copy.docx"),
            Some(UploadKind::Docx)
        );
        assert_eq!(
            UploadKind::detect("application/msword", "old"),
            Some(UploadKind::LegacyDoc)
        );
        assert_eq!(UploadKind::detect("text/markdown", "a.md"), Some(UploadKind::Text));
        assert_eq!(UploadKind::detect("application/zip", "a.zip"), None);
    }

    #[test]
    fn guesses_mime_from_name_when_missing() {
        assert_eq!(resolve_mime_type(None, "notes.txt"), "text/plain");
        assert_eq!(resolve_mime_type(Some("  "), "deck.pdf"), "application/pdf");
        assert_eq!(resolve_mime_type(Some("Image/PNG"), "x"), "image/png");
    }

    #[test]
    fn text_upload_reports_metrics() {
        let content = extract_upload("hello.txt", "text/plain", b"Hello world").unwrap();
        assert_eq!(content.text, "Hello world");
        assert_eq!(content.metadata.word_count, 2);
        assert_eq!(content.metadata.character_count, 11);
    }

    #[test]
    fn unsupported_type_is_rejected() {
        let err = extract_upload("a.zip", "application/zip", b"PK").unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(ref mime) if mime == "application/zip"));
    }

    #[test]
    fn legacy_doc_is_rejected_with_conversion_hint() {
        let err = extract_upload("old.doc", LEGACY_DOC_MIME, b"\xd0\xcf").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Legacy .doc format not fully supported. Please convert to .docx format."
        );
    }

    #[test]
    fn undecodable_image_still_yields_placeholder_and_fallback_colors() {
        let content = extract_upload("logo.png", "image/png", b"not an image").unwrap();
        assert!(content.text.starts_with("[Image Content - logo.png]"));
        assert_eq!(
            content.metadata.colors,
            Some(vec!["#000000".to_string(), "#ffffff".to_string()])
        );
        assert_eq!(content.raw_data["imageMetadata"]["format"], "png");
        assert_eq!(content.metadata.language.as_deref(), Some("eng"));
    }

    #[test]
    fn broken_docx_fails() {
        let err = extract_upload("copy.docx", DOCX_MIME, b"not a zip").unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse DOCX"));
    }
}
