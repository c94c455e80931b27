//! Brand compliance analysis through an LLM.

pub mod cache;
pub mod client;
pub mod prompt;

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::rules::BrandRules;

pub use cache::{cache_key, AnalysisCache};
pub use client::{AnthropicClient, LlmClient, LlmError};
pub use prompt::{build_prompt, parse_issues};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Grammar,
    BannedWord,
    ColorViolation,
    ImageViolation,
    VoiceTone,
    #[serde(other)]
    Other,
}

impl IssueType {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueType::Grammar => "grammar",
            IssueType::BannedWord => "banned_word",
            IssueType::ColorViolation => "color_violation",
            IssueType::ImageViolation => "image_violation",
            IssueType::VoiceTone => "voice_tone",
            IssueType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisIssue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<IssueLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub rule_violated: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub total_issues: usize,
    pub high_severity: usize,
    pub medium_severity: usize,
    pub low_severity: usize,
    pub score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    /// Milliseconds spent waiting on the LLM.
    pub analysis_time: u64,
    pub content_length: usize,
    pub rules_applied: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub issues: Vec<AnalysisIssue>,
    pub summary: AnalysisSummary,
    pub metadata: AnalysisMetadata,
}

#[derive(Debug, Clone)]
pub enum RuleSource {
    Structured(BrandRules),
    /// Rendered text of a single guideline document.
    Guidelines(String),
}

#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub content: String,
    pub file_name: String,
    pub file_type: String,
    pub extracted_colors: Vec<String>,
    pub extracted_images: Vec<String>,
    pub guidelines: RuleSource,
    /// Identity of `guidelines`, also keying stored results. Must not change
    /// between requests for the same rules.
    pub rules_checksum: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Claude analysis failed: {0}")]
    Llm(#[from] LlmError),
}

fn count(issues: &[AnalysisIssue], severity: Severity) -> usize {
    issues.iter().filter(|issue| issue.severity == severity).count()
}

pub fn compliance_score(issues: &[AnalysisIssue]) -> u32 {
    if issues.is_empty() {
        return 100;
    }
    let penalty = 10 * count(issues, Severity::High)
        + 5 * count(issues, Severity::Medium)
        + 2 * count(issues, Severity::Low);
    // bounded by 100 after the saturating subtraction
    100usize.saturating_sub(penalty) as u32
}

pub fn summarize(issues: &[AnalysisIssue]) -> AnalysisSummary {
    AnalysisSummary {
        total_issues: issues.len(),
        high_severity: count(issues, Severity::High),
        medium_severity: count(issues, Severity::Medium),
        low_severity: count(issues, Severity::Low),
        score: compliance_score(issues),
    }
}

pub fn rules_applied(source: &RuleSource) -> usize {
    match source {
        RuleSource::Guidelines(_) => 1,
        RuleSource::Structured(rules) => {
            rules.grammar.rules.len()
                + rules.banned_words.len()
                + rules.approved_colors.len()
                + rules.image_restrictions.rules.len()
                + rules.voice_and_tone.examples.len()
                + rules.additional_rules.len()
        }
    }
}

pub struct AnalysisService {
    llm: Arc<dyn LlmClient>,
    cache: AnalysisCache,
}

impl AnalysisService {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self::with_cache(llm, AnalysisCache::default())
    }

    pub fn with_cache(llm: Arc<dyn LlmClient>, cache: AnalysisCache) -> Self {
        Self { llm, cache }
    }

    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let key = cache_key(&request.content, &request.rules_checksum);
        if let Some(cached) = self.cache.get(&key).await {
            debug!(file = %request.file_name, "using cached analysis result");
            return Ok(cached);
        }

        let prompt = build_prompt(request);
        let started = Instant::now();
        let response = self.llm.complete(&prompt).await.map_err(|err| {
            error!(file = %request.file_name, error = %err, "LLM analysis failed");
            err
        })?;
        let analysis_time = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let issues = parse_issues(&response);
        let result = AnalysisResult {
            summary: summarize(&issues),
            metadata: AnalysisMetadata {
                analysis_time,
                content_length: request.content.chars().count(),
                rules_applied: rules_applied(&request.guidelines),
            },
            issues,
        };
        info!(
            file = %request.file_name,
            issues = result.summary.total_issues,
            score = result.summary.score,
            analysis_time,
            "analysis completed"
        );

        self.cache.insert(key, result.clone()).await;
        Ok(result)
    }
}
