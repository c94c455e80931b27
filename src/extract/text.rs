use std::sync::OnceLock;

use regex::Regex;

pub fn decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn rtf_control_word() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)\\[a-z]+\d*\s?").expect("valid rtf pattern"))
}

/// Drops control words and group braces, leaving the readable text.
pub fn strip_rtf(raw: &str) -> String {
    rtf_control_word()
        .replace_all(raw, "")
        .replace(['{', '}'], "")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Tsv,
    Csv,
}

/// Lays spreadsheet rows out as `Row N: a | b` between a header and trailer.
pub fn format_sheet(name: &str, raw: &str, format: SheetFormat) -> String {
    let rows: Vec<String> = raw
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(index, line)| {
            let cells: Vec<&str> = match format {
                SheetFormat::Tsv => line.split('\t').collect(),
                SheetFormat::Csv => line.split(',').map(strip_quotes).collect(),
            };
            format!("Row {}: {}", index + 1, cells.join(" | "))
        })
        .collect();
    let structured = rows.join("\n");

    match format {
        SheetFormat::Tsv => format!(
            "[Brand Guidelines from Google Sheets: {name}]\n\n\
             This spreadsheet contains brand guideline information organized in rows and columns.\n\n\
             Structured Content:\n{structured}\n\n\
             Raw Data:\n{raw}\n\n\
             Note: This content has been extracted from a Google Sheets document and formatted for brand compliance analysis."
        ),
        SheetFormat::Csv => format!(
            "[Brand Guidelines from Google Sheets: {name}]\n\n\
             This spreadsheet contains brand guideline information in CSV format.\n\n\
             Structured Content:\n{structured}\n\n\
             Raw CSV Data:\n{raw}\n\n\
             Note: This content has been extracted from a Google Sheets document via CSV export."
        ),
    }
}

fn strip_quotes(cell: &str) -> &str {
    cell.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(cell)
}
