use std::panic;

use pdfium_render::prelude::*;

pub struct PdfText {
    pub text: String,
    pub page_count: u32,
}

/// Pulls the text layer out of every page. Fails when PDFium is unavailable
/// or the document cannot be opened.
pub fn read_pdf(bytes: &[u8]) -> Result<PdfText, String> {
    let pdfium = panic::catch_unwind(Pdfium::default)
        .map_err(|_| "failed to initialize PDFium".to_string())?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|err| format!("load pdf: {err}"))?;

    let pages = document.pages();
    let total_pages = pages.len();
    let mut combined = String::new();
    for page_index in 0..total_pages {
        let page = pages
            .get(page_index)
            .map_err(|err| format!("load page {page_index}: {err}"))?;
        if let Ok(page_text) = page.text() {
            let text = page_text.all();
            if !text.is_empty() {
                combined.push_str(&text);
                combined.push('\n');
            }
        };
    }

    if combined.trim().is_empty() {
        return Err("pdf has no extractable text layer".into());
    }

    let page_count =
        u32::try_from(total_pages).map_err(|_| "page count exceeds supported range".to_string())?;

    Ok(PdfText {
        text: combined,
        page_count,
    })
}
