use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::{BrandFile, BrandRules, GrammarRules, ImageRestrictions, VoiceAndTone};

pub const DEFAULT_EXPECTATIONS: &str = "Follow professional writing standards";
pub const DEFAULT_VOICE: &str = "Maintain consistent brand voice and tone";
pub const DEFAULT_SIZE_REQUIREMENTS: &str = "Follow standard web image guidelines";
pub const DEFAULT_FORMATS: [&str; 3] = ["jpg", "png", "svg"];

const OTHER_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleCategory {
    BannedWords,
    Colors,
    Grammar,
    VoiceAndTone,
    ImageGuidelines,
    Other,
}

const CATEGORY_KEYWORDS: &[(&[&str], RuleCategory)] = &[
    (&["banned", "forbidden", "avoid"], RuleCategory::BannedWords),
    (&["color", "palette", "hex"], RuleCategory::Colors),
    (&["grammar", "style", "writing"], RuleCategory::Grammar),
    (&["voice", "tone", "brand"], RuleCategory::VoiceAndTone),
    (&["image", "photo", "visual"], RuleCategory::ImageGuidelines),
];

/// Picks the bucket a guideline file feeds from its name alone.
pub fn categorize(filename: &str) -> RuleCategory {
    let name = filename.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|keyword| name.contains(keyword)))
        .map(|(_, category)| *category)
        .unwrap_or(RuleCategory::Other)
}

fn hex_color() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"#([A-Fa-f0-9]{6}|[A-Fa-f0-9]{3})").expect("valid hex pattern"))
}

fn image_format() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(jpg|jpeg|png|gif|svg|webp)\b").expect("valid format pattern")
    })
}

fn numbered_bullet() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+\.").expect("valid bullet pattern"))
}

fn is_bullet(line: &str) -> bool {
    line.starts_with("- ") || line.starts_with("• ") || numbered_bullet().is_match(line)
}

fn strip_bullet(line: &str) -> String {
    let without_dash = line
        .strip_prefix(['-', '•'])
        .map(str::trim_start)
        .unwrap_or(line);
    let digits = without_dash
        .char_indices()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(index, c)| index + c.len_utf8());
    match digits {
        Some(end) if without_dash[end..].starts_with('.') => {
            without_dash[end + 1..].trim_start().to_string()
        }
        _ => without_dash.to_string(),
    }
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with("//")
}

fn non_empty_lines(content: &str) -> impl Iterator<Item = &str> {
    content.lines().map(str::trim).filter(|line| !line.is_empty())
}

fn string_array(value: &Value) -> Option<Vec<String>> {
    value.as_array().map(|items| {
        items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect()
    })
}

pub fn parse_banned_words(content: &str) -> Vec<String> {
    if let Ok(json) = serde_json::from_str::<Value>(content) {
        if let Some(words) = string_array(&json).or_else(|| json.get("banned_words").and_then(string_array)) {
            return words;
        }
    }

    content
        .split(['\n', ',', ';'])
        .map(|word| word.trim().to_lowercase())
        .filter(|word| !word.is_empty() && !is_comment(word))
        .collect()
}

pub fn parse_colors(content: &str) -> Vec<String> {
    if let Ok(json) = serde_json::from_str::<Value>(content) {
        let listed = string_array(&json)
            .or_else(|| json.get("colors").and_then(string_array))
            .or_else(|| json.get("palette").and_then(string_array));
        if let Some(colors) = listed {
            return colors;
        }
    }

    dedup(
        hex_color()
            .find_iter(content)
            .map(|found| found.as_str().to_string())
            .collect(),
    )
}

pub fn parse_grammar(content: &str) -> GrammarRules {
    let mut rules = Vec::new();
    let mut expectations = String::new();

    for line in non_empty_lines(content) {
        let lower = line.to_lowercase();
        if is_bullet(line) {
            rules.push(strip_bullet(line));
        } else if lower.contains("expectation") || lower.contains("overview") {
            expectations = line.to_string();
        } else if !is_comment(line) {
            rules.push(line.to_string());
        }
    }

    GrammarRules {
        rules,
        expectations: if expectations.is_empty() {
            DEFAULT_EXPECTATIONS.to_string()
        } else {
            expectations
        },
    }
}

pub fn parse_voice_and_tone(content: &str) -> VoiceAndTone {
    let mut description = String::new();
    let mut examples = Vec::new();
    let mut in_examples = false;

    for line in non_empty_lines(content) {
        let lower = line.to_lowercase();
        if lower.contains("example") || lower.contains("sample") {
            in_examples = true;
            continue;
        }

        if in_examples {
            if is_bullet(line) {
                examples.push(strip_bullet(line));
            } else if line.chars().count() > 10 {
                examples.push(line.to_string());
            }
        } else if !is_comment(line) && line.chars().count() > 10 {
            if !description.is_empty() {
                description.push(' ');
            }
            description.push_str(line);
        }
    }

    VoiceAndTone {
        description: if description.is_empty() {
            DEFAULT_VOICE.to_string()
        } else {
            description
        },
        examples,
    }
}

pub fn parse_image_guidelines(content: &str) -> ImageRestrictions {
    let mut rules = Vec::new();
    let mut formats = Vec::new();
    let mut size_requirements = String::new();

    for line in non_empty_lines(content) {
        let lower = line.to_lowercase();
        let names_format = ["jpg", "png", "svg"].iter().any(|ext| line.contains(ext));
        if lower.contains("format") && names_format {
            formats.extend(
                image_format()
                    .find_iter(line)
                    .map(|found| found.as_str().to_lowercase()),
            );
        } else if lower.contains("size") || lower.contains("dimension") {
            size_requirements = line.to_string();
        } else if is_bullet(line) {
            rules.push(strip_bullet(line));
        } else if !is_comment(line) && line.chars().count() > 10 {
            rules.push(line.to_string());
        }
    }

    ImageRestrictions {
        rules,
        allowed_formats: if formats.is_empty() {
            DEFAULT_FORMATS.iter().map(|f| f.to_string()).collect()
        } else {
            dedup(formats)
        },
        size_requirements: if size_requirements.is_empty() {
            DEFAULT_SIZE_REQUIREMENTS.to_string()
        } else {
            size_requirements
        },
    }
}

/// Keeps the first occurrence of every entry.
pub fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Merges parsed guideline files into one rule set.
pub fn aggregate(files: &[BrandFile]) -> BrandRules {
    let mut rules = BrandRules {
        grammar: GrammarRules {
            rules: Vec::new(),
            expectations: DEFAULT_EXPECTATIONS.to_string(),
        },
        banned_words: Vec::new(),
        approved_colors: Vec::new(),
        image_restrictions: ImageRestrictions {
            rules: Vec::new(),
            allowed_formats: DEFAULT_FORMATS.iter().map(|f| f.to_string()).collect(),
            size_requirements: DEFAULT_SIZE_REQUIREMENTS.to_string(),
        },
        voice_and_tone: VoiceAndTone {
            description: DEFAULT_VOICE.to_string(),
            examples: Vec::new(),
        },
        additional_rules: Vec::new(),
    };

    for file in files.iter().filter(|file| !file.content.is_empty()) {
        match categorize(&file.name) {
            RuleCategory::Grammar => {
                let parsed = parse_grammar(&file.content);
                rules.grammar.rules.extend(parsed.rules);
                rules.grammar.expectations = parsed.expectations;
            }
            RuleCategory::BannedWords => {
                rules.banned_words.extend(parse_banned_words(&file.content));
            }
            RuleCategory::Colors => {
                rules.approved_colors.extend(parse_colors(&file.content));
            }
            RuleCategory::VoiceAndTone => {
                let parsed = parse_voice_and_tone(&file.content);
                rules.voice_and_tone.description = parsed.description;
                rules.voice_and_tone.examples.extend(parsed.examples);
            }
            RuleCategory::ImageGuidelines => {
                let parsed = parse_image_guidelines(&file.content);
                rules.image_restrictions.rules.extend(parsed.rules);
                rules.image_restrictions.allowed_formats = parsed.allowed_formats;
                rules.image_restrictions.size_requirements = parsed.size_requirements;
            }
            RuleCategory::Other => {
                let excerpt: String = file.content.chars().take(OTHER_EXCERPT_CHARS).collect();
                rules
                    .additional_rules
                    .push(format!("From {}: {}...", file.name, excerpt));
            }
        }
    }

    rules.grammar.rules = dedup(std::mem::take(&mut rules.grammar.rules));
    rules.banned_words = dedup(std::mem::take(&mut rules.banned_words));
    rules.approved_colors = dedup(std::mem::take(&mut rules.approved_colors));
    rules.image_restrictions.rules = dedup(std::mem::take(&mut rules.image_restrictions.rules));
    rules.voice_and_tone.examples = dedup(std::mem::take(&mut rules.voice_and_tone.examples));
    rules.additional_rules = dedup(std::mem::take(&mut rules.additional_rules));

    rules
}
