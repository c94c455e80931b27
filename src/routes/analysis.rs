use std::time::Duration;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::{AnalysisIssue, AnalysisRequest, AnalysisResult, RuleSource};
use crate::auth::AuthenticatedUser;
use crate::email::AnalysisEmail;
use crate::error::{AppError, AppResult};
use crate::extract::{extract_guidelines, render_guidelines, BrandGuidelines};
use crate::models::{
    AnalysisRecord, IssueRecord, NewAnalysisRecord, NewIssueRecord, UploadedFile, ISSUE_STATUSES,
};
use crate::oauth;
use crate::repo;
use crate::repo::analyses::AnalysisStats;
use crate::rules::{self, RulesService};
use crate::state::AppState;

use super::files::load_accessible_file;
use super::parse_id;

const DOWNLOAD_LINK_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7);
const DEFAULT_GUIDELINE_NAME: &str = "Default Guidelines";
const NO_RULES_MESSAGE: &str = "No brand rules available. Please select a brand guidelines file or connect a Google Drive folder with brand guidelines.";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub brand_file_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryBody {
    pub total_issues: i64,
    pub high_severity: i64,
    pub medium_severity: i64,
    pub low_severity: i64,
    pub score: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResponse {
    pub message: &'static str,
    pub analysis_id: Uuid,
    pub summary: SummaryBody,
    pub issues: Value,
    pub rules_applied: i64,
    pub analysis_time: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_sent: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct IssueBody {
    pub id: Uuid,
    pub analysis_id: Uuid,
    pub issue_type: String,
    pub severity: String,
    pub message: String,
    pub rule_violated: Option<String>,
    pub location_context: Option<String>,
    pub line_number: Option<i32>,
    pub position_number: Option<i32>,
    pub suggestion: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<IssueRecord> for IssueBody {
    fn from(issue: IssueRecord) -> Self {
        Self {
            id: issue.id,
            analysis_id: issue.analysis_id,
            issue_type: issue.issue_type,
            severity: issue.severity,
            message: issue.message,
            rule_violated: issue.rule_violated,
            location_context: issue.location_context,
            line_number: issue.line_number,
            position_number: issue.position_number,
            suggestion: issue.suggestion,
            status: issue.status,
            created_at: issue.created_at,
            updated_at: issue.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IssueListResponse {
    pub issues: Vec<IssueBody>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueStatusResponse {
    pub message: &'static str,
    pub issue_id: Uuid,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisListQuery {
    pub stats: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummaryBody {
    pub id: Uuid,
    pub file_id: Uuid,
    pub total_issues: i32,
    pub high_severity_issues: i32,
    pub medium_severity_issues: i32,
    pub low_severity_issues: i32,
    pub compliance_score: i32,
    pub analysis_time_ms: i64,
    pub content_length: i32,
    pub rules_applied: i32,
    pub analyzed_at: DateTime<Utc>,
}

impl From<AnalysisRecord> for AnalysisSummaryBody {
    fn from(record: AnalysisRecord) -> Self {
        Self {
            id: record.id,
            file_id: record.file_id,
            total_issues: record.total_issues,
            high_severity_issues: record.high_severity_issues,
            medium_severity_issues: record.medium_severity_issues,
            low_severity_issues: record.low_severity_issues,
            compliance_score: record.compliance_score,
            analysis_time_ms: record.analysis_time_ms,
            content_length: record.content_length,
            rules_applied: record.rules_applied,
            analyzed_at: record.analyzed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysisListResponse {
    pub analyses: Vec<AnalysisSummaryBody>,
    pub stats: Option<AnalysisStats>,
}

/// Rules chosen for one analysis, with the checksum keying stored results.
struct SelectedRules {
    source: RuleSource,
    checksum: String,
    snapshot: Value,
}

fn sha256_hex(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

fn to_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

async fn guidelines_from_drive(
    state: &AppState,
    user: &AuthenticatedUser,
    brand_file_id: &str,
) -> Result<BrandGuidelines, String> {
    let token = oauth::valid_access_token(&state.pool, state.oauth.as_ref(), user.id)
        .await
        .map_err(|err| err.to_string())?
        .ok_or_else(|| "Google Drive is not connected".to_string())?;
    extract_guidelines(state.drive.as_ref(), &token, brand_file_id)
        .await
        .map_err(|err| err.to_string())
}

async fn select_rules(
    state: &AppState,
    user: &AuthenticatedUser,
    brand_file_id: Option<&str>,
) -> AppResult<SelectedRules> {
    if let Some(brand_file_id) = brand_file_id {
        match guidelines_from_drive(state, user, brand_file_id).await {
            Ok(guidelines) => {
                return Ok(SelectedRules {
                    checksum: guidelines.checksum(),
                    snapshot: json!({
                        "brandGuidelinesFile": brand_file_id,
                        "content": guidelines.content,
                    }),
                    source: RuleSource::Guidelines(render_guidelines(&guidelines)),
                });
            }
            Err(err) => {
                warn!(brand_file_id, error = %err, "brand file unavailable, falling back to aggregated rules");
                let rules = {
                    let mut conn = state.db()?;
                    RulesService::aggregate_for_user(&mut conn, user.id)?
                };
                let content = serde_json::to_string_pretty(&rules)?;
                return Ok(SelectedRules {
                    checksum: sha256_hex(&content),
                    snapshot: json!({ "brandGuidelinesFile": brand_file_id, "content": content }),
                    source: RuleSource::Guidelines(content),
                });
            }
        }
    }

    let rules = {
        let mut conn = state.db()?;
        RulesService::aggregate_for_user(&mut conn, user.id)?
    };
    if !rules::has_rules(&rules) {
        return Err(AppError::bad_request(NO_RULES_MESSAGE));
    }
    let content = serde_json::to_string_pretty(&rules)?;
    Ok(SelectedRules {
        checksum: sha256_hex(&content),
        snapshot: serde_json::to_value(&rules)?,
        source: RuleSource::Structured(rules),
    })
}

fn cached_response(record: AnalysisRecord) -> AnalyzeResponse {
    AnalyzeResponse {
        message: "Analysis completed successfully (cached)",
        analysis_id: record.id,
        summary: SummaryBody {
            total_issues: record.total_issues.into(),
            high_severity: record.high_severity_issues.into(),
            medium_severity: record.medium_severity_issues.into(),
            low_severity: record.low_severity_issues.into(),
            score: record.compliance_score.into(),
        },
        issues: record.issues,
        rules_applied: record.rules_applied.into(),
        analysis_time: record.analysis_time_ms,
        email_sent: None,
    }
}

fn issue_records(analysis_id: Uuid, issues: &[AnalysisIssue]) -> Vec<NewIssueRecord> {
    issues
        .iter()
        .map(|issue| {
            let location = issue.location.as_ref();
            NewIssueRecord {
                id: Uuid::new_v4(),
                analysis_id,
                issue_type: issue.issue_type.as_str().to_string(),
                severity: issue.severity.as_str().to_string(),
                message: issue.message.clone(),
                rule_violated: Some(issue.rule_violated.clone()),
                location_context: location.and_then(|l| l.context.clone()),
                line_number: location
                    .and_then(|l| l.line)
                    .and_then(|line| i32::try_from(line).ok()),
                position_number: location
                    .and_then(|l| l.position)
                    .and_then(|position| i32::try_from(position).ok()),
                suggestion: issue.suggestion.clone(),
            }
        })
        .collect()
}

async fn notify(
    state: &AppState,
    user: &AuthenticatedUser,
    file: &UploadedFile,
    result: &AnalysisResult,
) -> bool {
    let folder_name = state
        .db()
        .ok()
        .and_then(|mut conn| repo::drive::active_folder(&mut conn, user.id).ok().flatten())
        .map(|folder| folder.name)
        .unwrap_or_else(|| DEFAULT_GUIDELINE_NAME.to_string());

    let download_url = match state
        .storage
        .presign_get_object(&file.storage_path, DOWNLOAD_LINK_TTL)
        .await
    {
        Ok(url) => url,
        Err(err) => {
            warn!(file_id = %file.id, error = %err, "could not presign download link");
            format!("{}/dashboard", state.config.app_url.trim_end_matches('/'))
        }
    };

    let summary = &result.summary;
    let email = AnalysisEmail {
        file_name: file.original_filename.clone(),
        file_id: file.id.to_string(),
        user_email: user.email.clone(),
        compliance_score: summary.score,
        total_issues: summary.total_issues,
        high_severity_issues: summary.high_severity,
        medium_severity_issues: summary.medium_severity,
        low_severity_issues: summary.low_severity,
        issues: result.issues.clone(),
        guideline_folder_name: folder_name,
        download_url,
        analysis_date: Utc::now().format("%B %-d, %Y, %I:%M %p UTC").to_string(),
    };
    state.notifier.send_analysis_results(&email).await
}

pub async fn analyze_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(file_id): Path<String>,
    payload: Option<Json<AnalyzeRequest>>,
) -> AppResult<Json<AnalyzeResponse>> {
    let file_id = parse_id(&file_id, "File not found")?;
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let (file, results) = load_accessible_file(&state, &user, file_id)?;
    let results = results
        .filter(|results| !results.extracted_text.trim().is_empty())
        .ok_or_else(|| {
            AppError::bad_request("File has not been processed or contains no text content")
        })?;

    let brand_file_id = request
        .brand_file_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty());
    let selected = select_rules(&state, &user, brand_file_id).await?;

    {
        let mut conn = state.db()?;
        if let Some(cached) = repo::analyses::find_cached(&mut conn, file_id, &selected.checksum)? {
            info!(%file_id, analysis_id = %cached.id, "returning stored analysis");
            return Ok(Json(cached_response(cached)));
        }
    }

    let analysis_request = AnalysisRequest {
        content: results.extracted_text,
        file_name: file.original_filename.clone(),
        file_type: file.file_type.clone(),
        extracted_colors: results.colors,
        extracted_images: results.extracted_images,
        guidelines: selected.source,
        rules_checksum: selected.checksum.clone(),
    };
    let result = state.analysis.analyze(&analysis_request).await.map_err(|err| {
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "Claude analysis failed")
            .with_details(err.to_string())
    })?;

    let record = NewAnalysisRecord {
        id: Uuid::new_v4(),
        file_id,
        user_id: user.id,
        total_issues: to_i32(result.summary.total_issues),
        high_severity_issues: to_i32(result.summary.high_severity),
        medium_severity_issues: to_i32(result.summary.medium_severity),
        low_severity_issues: to_i32(result.summary.low_severity),
        compliance_score: i32::try_from(result.summary.score).unwrap_or(0),
        issues: serde_json::to_value(&result.issues)?,
        analysis_time_ms: to_i64(result.metadata.analysis_time),
        content_length: to_i32(result.metadata.content_length),
        rules_applied: to_i32(result.metadata.rules_applied),
        rules_snapshot: selected.snapshot,
        rules_checksum: selected.checksum,
    };
    let saved = state
        .db()
        .and_then(|mut conn| Ok(repo::analyses::insert_result(&mut conn, &record)?))
        .map_err(|err| {
            error!(%file_id, error = %err, "failed to save analysis result");
            AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to save analysis results to database",
            )
            .with_details(err.message().to_string())
        })?;

    let issues = issue_records(saved.id, &result.issues);
    let issues_saved = state
        .db()
        .and_then(|mut conn| Ok(repo::analyses::insert_issues(&mut conn, &issues)?));
    if let Err(err) = issues_saved {
        error!(analysis_id = %saved.id, error = %err, "failed to save analysis issues");
    }

    let email_sent = if user.email_notifications {
        notify(&state, &user, &file, &result).await
    } else {
        false
    };

    info!(
        %file_id,
        analysis_id = %saved.id,
        score = result.summary.score,
        issues = result.summary.total_issues,
        "analysis stored"
    );

    Ok(Json(AnalyzeResponse {
        message: "Analysis completed successfully",
        analysis_id: saved.id,
        summary: SummaryBody {
            total_issues: i64::from(saved.total_issues),
            high_severity: i64::from(saved.high_severity_issues),
            medium_severity: i64::from(saved.medium_severity_issues),
            low_severity: i64::from(saved.low_severity_issues),
            score: i64::from(saved.compliance_score),
        },
        issues: saved.issues,
        rules_applied: i64::from(saved.rules_applied),
        analysis_time: saved.analysis_time_ms,
        email_sent: Some(email_sent),
    }))
}

fn load_accessible_analysis(
    state: &AppState,
    user: &AuthenticatedUser,
    analysis_id: Uuid,
) -> AppResult<AnalysisRecord> {
    let mut conn = state.db()?;
    let analysis = repo::analyses::find_result(&mut conn, analysis_id)?
        .ok_or_else(|| AppError::not_found("Analysis not found"))?;
    if !user.can_access(analysis.user_id) {
        return Err(AppError::forbidden("Access denied"));
    }
    Ok(analysis)
}

pub async fn list_issues(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(analysis_id): Path<String>,
) -> AppResult<Json<IssueListResponse>> {
    let analysis_id = parse_id(&analysis_id, "Analysis not found")?;
    load_accessible_analysis(&state, &user, analysis_id)?;
    let mut conn = state.db()?;
    let issues = repo::analyses::list_issues(&mut conn, analysis_id)?;
    Ok(Json(IssueListResponse {
        issues: issues.into_iter().map(IssueBody::from).collect(),
    }))
}

pub async fn update_issue_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(analysis_id): Path<String>,
    payload: Option<Json<Value>>,
) -> AppResult<Json<IssueStatusResponse>> {
    let invalid = || AppError::bad_request("Invalid issueId or status");
    let payload = payload.map(|Json(body)| body).unwrap_or(Value::Null);
    let status = payload
        .get("status")
        .and_then(Value::as_str)
        .filter(|status| ISSUE_STATUSES.contains(status))
        .map(str::to_string)
        .ok_or_else(invalid)?;
    let issue_id = payload
        .get("issueId")
        .and_then(Value::as_str)
        .and_then(|id| Uuid::parse_str(id.trim()).ok())
        .ok_or_else(invalid)?;
    let analysis_id = parse_id(&analysis_id, "Analysis not found")?;

    load_accessible_analysis(&state, &user, analysis_id)?;
    let mut conn = state.db()?;
    repo::analyses::update_issue_status(&mut conn, analysis_id, issue_id, &status)?
        .ok_or_else(|| AppError::not_found("Issue not found"))?;
    info!(%analysis_id, %issue_id, status = %status, "issue status updated");

    Ok(Json(IssueStatusResponse {
        message: "Issue status updated successfully",
        issue_id,
        status,
    }))
}

pub async fn list_analyses(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<AnalysisListQuery>,
) -> AppResult<Json<AnalysisListResponse>> {
    let mut conn = state.db()?;
    let analyses = repo::analyses::list_by_user(&mut conn, user.id)?;
    let stats = if query.stats.as_deref() == Some("true") {
        Some(repo::analyses::user_stats(&mut conn, user.id, Utc::now())?)
    } else {
        None
    };

    Ok(Json(AnalysisListResponse {
        analyses: analyses.into_iter().map(AnalysisSummaryBody::from).collect(),
        stats,
    }))
}
