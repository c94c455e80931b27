use std::fmt::Write;

use serde_json::Value;
use tracing::warn;

use super::{AnalysisIssue, AnalysisRequest, RuleSource};
use crate::rules::BrandRules;

const PREAMBLE: &str = "You are a professional brand proofreader. Your job is to flag rule violations in content, NOT to suggest edits.\n\n\
IMPORTANT: Respond ONLY with a valid JSON array of issues. Do not include any other text, explanations, or formatting.";

const RESPONSE_FORMAT: &str = r#"**REQUIRED JSON FORMAT:**
[
  {
    "type": "grammar|banned_word|color_violation|image_violation|voice_tone|other",
    "severity": "high|medium|low",
    "message": "Clear description of the violation",
    "location": {
      "context": "Surrounding text where violation occurs"
    },
    "suggestion": "Optional: How to fix the violation",
    "ruleViolated": "The specific rule or guideline that was violated"
  }
]

Return empty array [] if no violations found."#;

const SEVERITY_GUIDE: &str = "3. Assign severity: \"high\" (major brand violations), \"medium\" (style issues), \"low\" (minor concerns)\n\
4. Include location context when possible";

fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn or_fallback<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn structured_section(rules: &BrandRules) -> String {
    let mut out = String::from("**BRAND RULES TO ENFORCE:**\n\n**Grammar & Writing Rules:**\n");
    let _ = writeln!(
        out,
        "Expectations: {}",
        or_fallback(&rules.grammar.expectations, "No grammar expectations specified")
    );
    if !rules.grammar.rules.is_empty() {
        let _ = writeln!(out, "Rules:\n{}", bullets(&rules.grammar.rules));
    }

    out.push_str("\n**Banned Words:**\n");
    if rules.banned_words.is_empty() {
        out.push_str("No banned words specified\n");
    } else {
        let _ = writeln!(
            out,
            "The following words/phrases are prohibited: {}",
            rules.banned_words.join(", ")
        );
    }

    out.push_str("\n**Approved Colors:**\n");
    if rules.approved_colors.is_empty() {
        out.push_str("No color restrictions specified\n");
    } else {
        let _ = writeln!(
            out,
            "Only these hex colors are approved: {}",
            rules.approved_colors.join(", ")
        );
    }

    out.push_str("\n**Image Restrictions:**\n");
    let images = &rules.image_restrictions;
    if images.rules.is_empty() {
        out.push_str("No image restrictions specified\n");
    } else {
        let formats = if images.allowed_formats.is_empty() {
            "Not specified".to_string()
        } else {
            images.allowed_formats.join(", ")
        };
        let _ = writeln!(
            out,
            "Rules:\n{}\nAllowed formats: {}\nSize requirements: {}",
            bullets(&images.rules),
            formats,
            or_fallback(&images.size_requirements, "Not specified")
        );
    }

    out.push_str("\n**Voice & Tone Guidelines:**\n");
    let _ = writeln!(
        out,
        "{}",
        or_fallback(
            &rules.voice_and_tone.description,
            "No voice and tone guidelines specified"
        )
    );
    if !rules.voice_and_tone.examples.is_empty() {
        let _ = writeln!(out, "Examples:\n{}", bullets(&rules.voice_and_tone.examples));
    }

    if !rules.additional_rules.is_empty() {
        let _ = writeln!(
            out,
            "\n**Additional Rules:**\n{}",
            bullets(&rules.additional_rules)
        );
    }

    let _ = write!(
        out,
        "\n**ANALYSIS INSTRUCTIONS:**\n\
         1. Check content against ALL provided rules\n\
         2. Flag violations with specific details\n\
         {SEVERITY_GUIDE}\n\
         5. Reference the specific rule violated"
    );
    out
}

fn guidelines_section(guidelines: &str) -> String {
    format!(
        "**BRAND GUIDELINES TO ENFORCE:**\n\n{guidelines}\n\n\
         **ANALYSIS INSTRUCTIONS:**\n\
         1. Analyze the content against the brand guidelines provided above\n\
         2. Flag any violations or areas of non-compliance\n\
         {SEVERITY_GUIDE}\n\
         5. Reference the specific guideline or rule violated"
    )
}

pub fn build_prompt(request: &AnalysisRequest) -> String {
    let mut prompt = format!(
        "{PREAMBLE}\n\n**CONTENT TO ANALYZE:**\nFile: {} ({})\nContent: \"\"\"\n{}\n\"\"\"\n",
        request.file_name, request.file_type, request.content
    );

    if !request.extracted_colors.is_empty() {
        let _ = writeln!(
            prompt,
            "\n**EXTRACTED COLORS FROM CONTENT:**\n{}",
            request.extracted_colors.join(", ")
        );
    }
    if !request.extracted_images.is_empty() {
        let _ = writeln!(
            prompt,
            "\n**EXTRACTED IMAGES:**\n{}",
            request.extracted_images.join(", ")
        );
    }

    let rules = match &request.guidelines {
        RuleSource::Structured(rules) => structured_section(rules),
        RuleSource::Guidelines(text) => guidelines_section(text),
    };

    format!("{prompt}\n{rules}\n\n{RESPONSE_FORMAT}")
}

/// Pulls the outermost JSON array out of the model reply.
pub fn parse_issues(text: &str) -> Vec<AnalysisIssue> {
    let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) else {
        warn!(response_len = text.len(), "no JSON array found in LLM response");
        return Vec::new();
    };
    if end < start {
        warn!(response_len = text.len(), "no JSON array found in LLM response");
        return Vec::new();
    }

    match serde_json::from_str::<Vec<Value>>(&text[start..=end]) {
        Ok(items) => items.into_iter().filter_map(issue_from_value).collect(),
        Err(err) => {
            warn!(error = %err, "failed to parse LLM response as issues");
            Vec::new()
        }
    }
}

/// One reply element as an issue. Type and severity are lower-cased and an
/// unknown severity counts as medium; elements without a message are dropped.
fn issue_from_value(mut item: Value) -> Option<AnalysisIssue> {
    let Some(fields) = item.as_object_mut() else {
        warn!("skipping non-object issue in LLM response");
        return None;
    };

    let severity = match fields
        .get("severity")
        .and_then(Value::as_str)
        .map(str::to_lowercase)
        .as_deref()
    {
        Some(known @ ("high" | "medium" | "low")) => known.to_string(),
        _ => "medium".to_string(),
    };
    fields.insert("severity".into(), Value::String(severity));

    let issue_type = fields
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_lowercase)
        .unwrap_or_else(|| "other".to_string());
    fields.insert("type".into(), Value::String(issue_type));

    match serde_json::from_value(item) {
        Ok(issue) => Some(issue),
        Err(err) => {
            warn!(error = %err, "skipping malformed issue in LLM response");
            None
        }
    }
}
