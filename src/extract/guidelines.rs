use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::task;
use tracing::{info, warn};

use super::text::{self, SheetFormat};
use super::{docx, pdf, ExtractError};
use crate::drive::{DriveApi, DriveFileMeta};

/// Guideline text pulled out of one Drive file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandGuidelines {
    pub content: String,
    pub file_type: String,
    pub file_name: String,
    pub extracted_at: DateTime<Utc>,
}

impl BrandGuidelines {
    /// sha256 over name, type and content. `extracted_at` is left out so the
    /// same document always yields the same checksum.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        for part in [&self.file_name, &self.file_type, &self.content] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        hex::encode(hasher.finalize())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuidelineKind {
    GoogleDoc,
    GoogleSlides,
    GoogleSheet,
    Pdf,
    WordDocument,
    LegacyWord,
    PowerPoint,
    Excel,
    PlainText,
    Rtf,
    Json,
    Xml,
    Image,
    Archive,
    Adobe,
    OpenDocument,
}

const GUIDELINE_TYPES: &[(&str, GuidelineKind)] = &[
    ("application/vnd.google-apps.document", GuidelineKind::GoogleDoc),
    ("application/vnd.google-apps.presentation", GuidelineKind::GoogleSlides),
    ("application/vnd.google-apps.spreadsheet", GuidelineKind::GoogleSheet),
    ("application/pdf", GuidelineKind::Pdf),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        GuidelineKind::WordDocument,
    ),
    (
        "application/vnd.openxmlformats-officedocument.wordprocessingml.template",
        GuidelineKind::WordDocument,
    ),
    (
        "application/vnd.ms-word.document.macroEnabled.12",
        GuidelineKind::WordDocument,
    ),
    ("application/msword", GuidelineKind::LegacyWord),
    (
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        GuidelineKind::PowerPoint,
    ),
    ("application/vnd.ms-powerpoint", GuidelineKind::PowerPoint),
    (
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        GuidelineKind::Excel,
    ),
    ("application/vnd.ms-excel", GuidelineKind::Excel),
    ("text/plain", GuidelineKind::PlainText),
    ("text/markdown", GuidelineKind::PlainText),
    ("text/html", GuidelineKind::PlainText),
    ("text/css", GuidelineKind::PlainText),
    ("text/rtf", GuidelineKind::Rtf),
    ("application/rtf", GuidelineKind::Rtf),
    ("application/json", GuidelineKind::Json),
    ("application/xml", GuidelineKind::Xml),
    ("text/xml", GuidelineKind::Xml),
    ("application/zip", GuidelineKind::Archive),
    ("application/x-zip-compressed", GuidelineKind::Archive),
    ("application/x-rar-compressed", GuidelineKind::Archive),
    ("application/x-7z-compressed", GuidelineKind::Archive),
    ("application/postscript", GuidelineKind::Adobe),
    ("application/x-photoshop", GuidelineKind::Adobe),
    ("application/vnd.oasis.opendocument.text", GuidelineKind::OpenDocument),
    (
        "application/vnd.oasis.opendocument.presentation",
        GuidelineKind::OpenDocument,
    ),
    (
        "application/vnd.oasis.opendocument.spreadsheet",
        GuidelineKind::OpenDocument,
    ),
];

impl GuidelineKind {
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        // Any image/* (including Photoshop's image/vnd.adobe.photoshop) is an image.
        if mime_type.starts_with("image/") {
            return Some(GuidelineKind::Image);
        }
        GUIDELINE_TYPES
            .iter()
            .find(|(mime, _)| *mime == mime_type)
            .map(|(_, kind)| *kind)
    }

    pub fn is_supported(mime_type: &str) -> bool {
        Self::from_mime(mime_type).is_some()
    }
}

/// Fetches a Drive file and turns it into guideline text.
///
/// Degraded but supported content becomes a bracketed placeholder; only
/// unsupported types and empty results are errors.
pub async fn extract_guidelines(
    drive: &dyn DriveApi,
    access_token: &str,
    file_id: &str,
) -> Result<BrandGuidelines, ExtractError> {
    let meta = drive.file_metadata(access_token, file_id).await?;
    let content = extract_content(drive, access_token, &meta).await?;

    if content.trim().is_empty() {
        return Err(ExtractError::Empty);
    }

    info!(
        file_id,
        mime_type = %meta.mime_type,
        content_length = content.len(),
        "extracted brand guidelines"
    );

    Ok(BrandGuidelines {
        content: content.trim().to_string(),
        file_type: if meta.mime_type.is_empty() {
            "unknown".to_string()
        } else {
            meta.mime_type
        },
        file_name: meta.name,
        extracted_at: Utc::now(),
    })
}

async fn extract_content(
    drive: &dyn DriveApi,
    token: &str,
    meta: &DriveFileMeta,
) -> Result<String, ExtractError> {
    let name = meta.name.as_str();
    let mime = meta.mime_type.as_str();
    let kind = GuidelineKind::from_mime(mime)
        .ok_or_else(|| ExtractError::Unsupported(mime.to_string()))?;

    let content = match kind {
        GuidelineKind::GoogleDoc | GuidelineKind::GoogleSlides => {
            drive.export(token, &meta.id, "text/plain").await?
        }
        GuidelineKind::GoogleSheet => export_sheet(drive, token, meta).await,
        GuidelineKind::Pdf => {
            let parsed = match drive.download(token, &meta.id).await {
                Ok(bytes) => run_blocking(move || pdf::read_pdf(&bytes).map(|parsed| parsed.text)).await,
                Err(err) => Err(err.to_string()),
            };
            parsed.unwrap_or_else(|err| {
                warn!(file = name, error = %err, "pdf guideline parsing failed");
                format!(
                    "[PDF document: {name}. Text extraction failed. Please try converting to a \
                     different format for better analysis.]"
                )
            })
        }
        GuidelineKind::WordDocument => match drive.download(token, &meta.id).await {
            Ok(bytes) if !bytes.is_empty() => {
                match run_blocking(move || docx::read_docx(&bytes).map(|parsed| parsed.text)).await {
                    Ok(text) if !text.trim().is_empty() => text,
                    Ok(_) => format!(
                        "[DOCX document: {name}. The document appears to be empty or contains only \
                         formatting. Please ensure the document has text content for brand \
                         guidelines analysis.]"
                    ),
                    Err(err) => format!(
                        "[DOCX document: {name}. Text extraction failed. Error: {err}. Please try \
                         converting to PDF or plain text format for better analysis.]"
                    ),
                }
            }
            Ok(_) | Err(_) => format!(
                "[Word document: {name}. Document could not be processed due to a technical \
                 issue. Please try converting to PDF or plain text format for analysis.]"
            ),
        },
        GuidelineKind::LegacyWord => format!(
            "[Word document: {name}. This appears to be an older .doc format that requires \
             conversion. Please save as .docx format for better text extraction.]"
        ),
        GuidelineKind::PowerPoint => format!(
            "[PowerPoint presentation: {name}. Content extraction for presentations requires \
             additional processing. Please convert to PDF or text format for better analysis.]"
        ),
        GuidelineKind::Excel => match drive.download(token, &meta.id).await {
            Ok(bytes) => excel_placeholder(name, mime, bytes.len()),
            Err(err) => {
                warn!(file = name, error = %err, "excel download failed");
                format!(
                    "[Excel spreadsheet: {name}. Unable to process Excel file content. Please \
                     convert to Google Sheets, CSV, or text format for better analysis.]"
                )
            }
        },
        GuidelineKind::PlainText => text::decode_lossy(&drive.download(token, &meta.id).await?),
        GuidelineKind::Rtf => {
            text::strip_rtf(&text::decode_lossy(&drive.download(token, &meta.id).await?))
        }
        GuidelineKind::Json => {
            let bytes = drive.download(token, &meta.id).await?;
            let value: serde_json::Value = serde_json::from_slice(&bytes)
                .map_err(|err| ExtractError::Failed(format!("Invalid JSON in {name}: {err}")))?;
            let pretty = serde_json::to_string_pretty(&value)
                .map_err(|err| ExtractError::Failed(err.to_string()))?;
            format!("[JSON data from {name}]\n{pretty}")
        }
        GuidelineKind::Xml => {
            let raw = text::decode_lossy(&drive.download(token, &meta.id).await?);
            format!("[XML data from {name}]\n{raw}")
        }
        GuidelineKind::Image => format!(
            "[Image file: {name} ({mime}). Image content analysis requires OCR processing. \
             Consider providing a text description of the image content or convert to PDF with \
             text for better analysis.]"
        ),
        GuidelineKind::Archive => format!(
            "[Archive file: {name} ({mime}). Archive content extraction not implemented. Please \
             extract files manually and upload individual brand guideline documents.]"
        ),
        GuidelineKind::Adobe => format!(
            "[Adobe file: {name} ({mime}). Adobe file content extraction not implemented. Please \
             export to PDF or image format for analysis.]"
        ),
        GuidelineKind::OpenDocument => format!(
            "[OpenDocument file: {name} ({mime}). OpenDocument format support not fully \
             implemented. Please convert to Microsoft Office or PDF format for better analysis.]"
        ),
    };

    Ok(content)
}

async fn export_sheet(drive: &dyn DriveApi, token: &str, meta: &DriveFileMeta) -> String {
    let name = meta.name.as_str();
    let exports = [
        ("text/tab-separated-values", SheetFormat::Tsv),
        ("text/csv", SheetFormat::Csv),
    ];

    for (mime, format) in exports {
        match drive.export(token, &meta.id, mime).await {
            Ok(raw) if !raw.trim().is_empty() => return text::format_sheet(name, &raw, format),
            Ok(_) => warn!(file = name, mime, "sheet export was empty"),
            Err(err) => warn!(file = name, mime, error = %err, "sheet export failed"),
        }
    }

    format!(
        "[Google Sheets: {name}. Unable to export spreadsheet content. Please ensure the sheet \
         contains data and try converting to Google Docs or PDF format for better analysis.]"
    )
}

fn excel_placeholder(name: &str, mime: &str, size: usize) -> String {
    format!(
        "[Excel Spreadsheet: {name}]\n\n\
         This Excel file contains brand guideline information organized in spreadsheet format.\n\n\
         File Details:\n\
         - File Type: {mime}\n\
         - Size: {size} bytes\n\n\
         Note: This is an Excel spreadsheet that may contain:\n\
         - Brand color palettes and hex codes\n\
         - Typography guidelines and font specifications\n\
         - Logo usage rules and sizing guidelines\n\
         - Brand voice and tone guidelines\n\
         - Compliance rules and restrictions\n\
         - Style guide specifications\n\n\
         For better text analysis, consider:\n\
         1. Converting to Google Sheets and then selecting it as your brand file\n\
         2. Exporting key sections to a Word document or PDF\n\
         3. Converting to CSV format with clear headers and guidelines\n\n\
         The analysis will continue using the default database brand rules."
    )
}

async fn run_blocking<F>(job: F) -> Result<String, String>
where
    F: FnOnce() -> Result<String, String> + Send + 'static,
{
    task::spawn_blocking(job)
        .await
        .map_err(|err| format!("parser task failed: {err}"))?
}

/// Guideline block handed to the analyser in place of structured rules.
pub fn render_guidelines(guidelines: &BrandGuidelines) -> String {
    format!(
        "Brand Guidelines from \"{name}\":\n\n{content}\n\n---\nExtracted at: {at}\nFile type: {file_type}\n\n\
         Please analyze the uploaded content against these specific brand guidelines and identify \
         any violations or areas of non-compliance.",
        name = guidelines.file_name,
        content = guidelines.content,
        at = guidelines
            .extracted_at
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        file_type = guidelines.file_type,
    )
}
