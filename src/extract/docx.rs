use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

const DOCUMENT_PART: &str = "word/document.xml";

#[derive(Debug, Default)]
pub struct DocxContent {
    pub text: String,
    pub paragraphs: usize,
    pub font_families: Vec<String>,
    pub font_sizes: Vec<f64>,
}

/// Reads the main document part of a WordprocessingML package.
pub fn read_docx(bytes: &[u8]) -> Result<DocxContent, String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|err| format!("open package: {err}"))?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|err| format!("{DOCUMENT_PART}: {err}"))?
        .read_to_string(&mut xml)
        .map_err(|err| format!("read {DOCUMENT_PART}: {err}"))?;

    parse_document_xml(&xml)
}

fn parse_document_xml(xml: &str) -> Result<DocxContent, String> {
    let mut reader = Reader::from_str(xml);
    let mut content = DocxContent::default();
    let mut in_text_run = false;
    let mut run_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => match element.local_name().as_ref() {
                b"t" => in_text_run = true,
                b"r" => run_depth += 1,
                _ => visit_element(&element, run_depth > 0, &mut content),
            },
            Ok(Event::Empty(element)) => visit_element(&element, run_depth > 0, &mut content),
            Ok(Event::Text(text)) if in_text_run => {
                let unescaped = text.unescape().map_err(|err| err.to_string())?;
                content.text.push_str(&unescaped);
            }
            Ok(Event::End(element)) => match element.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"r" => run_depth = run_depth.saturating_sub(1),
                b"p" => {
                    content.text.push('\n');
                    content.paragraphs += 1;
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(format!(
                    "xml error at position {}: {err}",
                    reader.buffer_position()
                ))
            }
            _ => {}
        }
    }

    let trimmed_len = content.text.trim_end().len();
    content.text.truncate(trimmed_len);
    Ok(content)
}

fn visit_element(element: &BytesStart<'_>, in_run: bool, content: &mut DocxContent) {
    match element.local_name().as_ref() {
        // outside a run, w:tab is a tab stop definition in w:pPr/w:tabs
        b"tab" if in_run => content.text.push('\t'),
        b"br" | b"cr" => content.text.push('\n'),
        b"rFonts" => {
            if let Some(family) = attribute(element, b"ascii") {
                if !content.font_families.contains(&family) {
                    content.font_families.push(family);
                }
            }
        }
        b"sz" => {
            let half_points = attribute(element, b"val").and_then(|v| v.parse::<f64>().ok());
            if let Some(size) = half_points.map(|value| value / 2.0) {
                if !content.font_sizes.contains(&size) {
                    content.font_sizes.push(size);
                }
            }
        }
        _ => {}
    }
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok().map(|value| value.into_owned()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(DOCUMENT_PART, zip::write::SimpleFileOptions::default())
            .expect("start file");
        writer
            .write_all(document_xml.as_bytes())
            .expect("write xml");
        writer.finish().expect("finish zip").into_inner()
    }

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p>
      <w:r>
        <w:rPr><w:rFonts w:ascii="Helvetica" w:hAnsi="Helvetica"/><w:sz w:val="24"/></w:rPr>
        <w:t>Brand</w:t>
        <w:tab/>
        <w:t xml:space="preserve">voice &amp; tone</w:t>
      </w:r>
    </w:p>
    <w:p>
      <w:r>
        <w:rPr><w:rFonts w:ascii="Georgia"/><w:sz w:val="21"/></w:rPr>
        <w:t>Second line</w:t>
        <w:br/>
        <w:t>after break</w:t>
      </w:r>
    </w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn extracts_runs_paragraphs_and_fonts() {
        let content = read_docx(&docx_bytes(SAMPLE)).unwrap();
        assert_eq!(content.text, "Brand\tvoice & tone\nSecond line\nafter break");
        assert_eq!(content.paragraphs, 2);
        assert_eq!(content.font_families, vec!["Helvetica", "Georgia"]);
        assert_eq!(content.font_sizes, vec![12.0, 10.5]);
    }

    #[test]
    fn tab_stops_do_not_add_text() {
        let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p>
      <w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr>
      <w:r><w:t>Heading</w:t><w:tab/><w:t>1</w:t></w:r>
    </w:p>
  </w:body>
</w:document>"#;
        let content = read_docx(&docx_bytes(xml)).unwrap();
        assert_eq!(content.text, "Heading\t1");
    }

    #[test]
    fn missing_document_part_is_an_error() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("other.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<x/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = read_docx(&bytes).unwrap_err();
        assert!(err.contains(DOCUMENT_PART));
    }

    #[test]
    fn rejects_non_zip_input() {
        assert!(read_docx(b"plain text").is_err());
    }
}
