//! Brand rule aggregation from the guideline files of a user's active Drive folder.

pub mod parsers;

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::DriveFileRecord;
use crate::repo;

pub use parsers::{aggregate, categorize, RuleCategory};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarRules {
    pub rules: Vec<String>,
    pub expectations: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRestrictions {
    pub rules: Vec<String>,
    pub allowed_formats: Vec<String>,
    pub size_requirements: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceAndTone {
    pub description: String,
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandRules {
    pub grammar: GrammarRules,
    pub banned_words: Vec<String>,
    pub approved_colors: Vec<String>,
    pub image_restrictions: ImageRestrictions,
    pub voice_and_tone: VoiceAndTone,
    pub additional_rules: Vec<String>,
}

/// A guideline file with its extracted text.
#[derive(Debug, Clone)]
pub struct BrandFile {
    pub name: String,
    pub modified_time: Option<DateTime<Utc>>,
    pub content: String,
}

impl From<DriveFileRecord> for BrandFile {
    fn from(record: DriveFileRecord) -> Self {
        Self {
            name: record.name,
            modified_time: record.modified_time,
            content: record.content.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RulesSummary {
    pub grammar_rules: usize,
    pub banned_words: usize,
    pub approved_colors: usize,
    pub image_restrictions: usize,
    pub additional_rules: usize,
    pub total_rules: usize,
}

impl RulesSummary {
    pub fn of(rules: &BrandRules) -> Self {
        let grammar_rules = rules.grammar.rules.len();
        let banned_words = rules.banned_words.len();
        let approved_colors = rules.approved_colors.len();
        let image_restrictions = rules.image_restrictions.rules.len();
        let additional_rules = rules.additional_rules.len();
        Self {
            grammar_rules,
            banned_words,
            approved_colors,
            image_restrictions,
            additional_rules,
            total_rules: grammar_rules
                + banned_words
                + approved_colors
                + image_restrictions
                + additional_rules,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// Rules used while no guideline folder has been connected.
pub fn default_rules() -> BrandRules {
    BrandRules {
        grammar: GrammarRules {
            rules: strings(&[
                "Use active voice when possible",
                "Avoid overly complex sentences",
                "Check for spelling and grammar errors",
                "Use consistent terminology",
            ]),
            expectations: "Professional, clear, and engaging writing style".to_string(),
        },
        banned_words: strings(&["very", "really", "actually", "literally", "obviously"]),
        approved_colors: strings(&["#000000", "#FFFFFF", "#007BFF", "#28A745", "#DC3545"]),
        image_restrictions: ImageRestrictions {
            rules: strings(&[
                "Images should be high resolution",
                "Maintain consistent visual style",
                "Use approved color palette",
                "Include proper alt text",
            ]),
            allowed_formats: strings(&["jpg", "png", "svg"]),
            size_requirements: "Minimum 300dpi for print materials".to_string(),
        },
        voice_and_tone: VoiceAndTone {
            description: "Professional, friendly, and informative tone".to_string(),
            examples: strings(&[
                "We help you achieve your goals",
                "Discover the possibilities",
                "Transform your business",
            ]),
        },
        additional_rules: strings(&[
            "Always include a clear call-to-action",
            "Ensure content is accessible and inclusive",
            "Maintain brand consistency across all materials",
        ]),
    }
}

pub fn count_rules(rules: &BrandRules) -> usize {
    let voice = usize::from(!rules.voice_and_tone.description.is_empty());
    RulesSummary::of(rules).total_rules + voice
}

pub fn has_rules(rules: &BrandRules) -> bool {
    RulesSummary::of(rules).total_rules > 0
}

/// Order-independent fingerprint of the files that carry content.
pub fn files_checksum(files: &[BrandFile]) -> String {
    let mut entries: Vec<String> = files
        .iter()
        .filter(|file| !file.content.is_empty())
        .map(|file| {
            let modified = file
                .modified_time
                .map(|time| time.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_else(|| "null".to_string());
            format!("{}:{}:{}", file.name, modified, file.content.chars().count())
        })
        .collect();
    entries.sort();

    hex::encode(Sha256::digest(entries.join("|").as_bytes()))
}

pub struct RulesService;

impl RulesService {
    /// Resolves the rule set for `user_id`, parsing guideline files only on a cache miss.
    pub fn aggregate_for_user(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<BrandRules> {
        let Some(folder) = repo::drive::active_folder(conn, user_id)? else {
            debug!(%user_id, "no active brand folder, using default rules");
            return Ok(default_rules());
        };

        let files: Vec<BrandFile> = repo::drive::brand_files(conn, folder.id)?
            .into_iter()
            .map(BrandFile::from)
            .collect();
        if files.is_empty() {
            debug!(%user_id, folder_id = %folder.id, "brand folder has no synced files, using default rules");
            return Ok(default_rules());
        }
        // Files without content still count: they aggregate to empty buckets.

        let checksum = files_checksum(&files);
        if let Some(cached) = repo::rules_cache::get_cached_rules(conn, &checksum)? {
            match serde_json::from_value::<BrandRules>(cached.rules) {
                Ok(rules) => {
                    debug!(%checksum, "using cached brand rules");
                    return Ok(rules);
                }
                Err(err) => warn!(%checksum, error = %err, "discarding unreadable cached brand rules"),
            }
        }

        let rules = aggregate(&files);
        let total = i32::try_from(count_rules(&rules)).unwrap_or(i32::MAX);
        match serde_json::to_value(&rules) {
            Ok(value) => {
                repo::rules_cache::cache_rules(conn, &checksum, value, total)?;
            }
            Err(err) => warn!(%checksum, error = %err, "failed to serialize brand rules for cache"),
        }
        info!(%user_id, files = files.len(), total_rules = total, "parsed brand rules");

        Ok(rules)
    }
}
