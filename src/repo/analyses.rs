use chrono::{DateTime, Duration, Utc};
use diesel::{dsl::count_star, prelude::*};
use serde::Serialize;
use uuid::Uuid;

use crate::models::{AnalysisRecord, IssueRecord, NewAnalysisRecord, NewIssueRecord};
use crate::schema::{analysis_issues, brand_analysis_results};

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStats {
    pub total_analyses: i64,
    pub avg_compliance_score: i64,
    pub total_issues: i64,
    pub recent_analyses: i64,
}

/// Newest stored result for the same file analysed against the same rules.
pub fn find_cached(
    conn: &mut PgConnection,
    file_id: Uuid,
    rules_checksum: &str,
) -> QueryResult<Option<AnalysisRecord>> {
    brand_analysis_results::table
        .filter(brand_analysis_results::file_id.eq(file_id))
        .filter(brand_analysis_results::rules_checksum.eq(rules_checksum))
        .order(brand_analysis_results::analyzed_at.desc())
        .first(conn)
        .optional()
}

pub fn insert_result(
    conn: &mut PgConnection,
    record: &NewAnalysisRecord,
) -> QueryResult<AnalysisRecord> {
    diesel::insert_into(brand_analysis_results::table)
        .values(record)
        .get_result(conn)
}

pub fn insert_issues(conn: &mut PgConnection, issues: &[NewIssueRecord]) -> QueryResult<usize> {
    if issues.is_empty() {
        return Ok(0);
    }
    diesel::insert_into(analysis_issues::table)
        .values(issues)
        .execute(conn)
}

pub fn find_result(
    conn: &mut PgConnection,
    analysis_id: Uuid,
) -> QueryResult<Option<AnalysisRecord>> {
    brand_analysis_results::table
        .find(analysis_id)
        .first(conn)
        .optional()
}

pub fn list_issues(conn: &mut PgConnection, analysis_id: Uuid) -> QueryResult<Vec<IssueRecord>> {
    analysis_issues::table
        .filter(analysis_issues::analysis_id.eq(analysis_id))
        .order(analysis_issues::created_at.asc())
        .load(conn)
}

/// Returns `None` when the issue does not belong to the analysis.
pub fn update_issue_status(
    conn: &mut PgConnection,
    analysis_id: Uuid,
    issue_id: Uuid,
    status: &str,
) -> QueryResult<Option<IssueRecord>> {
    diesel::update(
        analysis_issues::table
            .filter(analysis_issues::id.eq(issue_id))
            .filter(analysis_issues::analysis_id.eq(analysis_id)),
    )
    .set((
        analysis_issues::status.eq(status),
        analysis_issues::updated_at.eq(Utc::now()),
    ))
    .get_result(conn)
    .optional()
}

pub fn list_by_user(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Vec<AnalysisRecord>> {
    brand_analysis_results::table
        .filter(brand_analysis_results::user_id.eq(user_id))
        .order(brand_analysis_results::analyzed_at.desc())
        .load(conn)
}

pub fn user_stats(
    conn: &mut PgConnection,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> QueryResult<AnalysisStats> {
    let rows: Vec<(i32, i32, DateTime<Utc>)> = brand_analysis_results::table
        .filter(brand_analysis_results::user_id.eq(user_id))
        .select((
            brand_analysis_results::compliance_score,
            brand_analysis_results::total_issues,
            brand_analysis_results::analyzed_at,
        ))
        .load(conn)?;

    Ok(summarize_rows(&rows, now))
}

pub fn count_all(conn: &mut PgConnection) -> QueryResult<i64> {
    brand_analysis_results::table
        .select(count_star())
        .first(conn)
}

fn summarize_rows(rows: &[(i32, i32, DateTime<Utc>)], now: DateTime<Utc>) -> AnalysisStats {
    if rows.is_empty() {
        return AnalysisStats::default();
    }

    let week_ago = now - Duration::days(7);
    let score_sum: i64 = rows.iter().map(|(score, _, _)| i64::from(*score)).sum();
    let total = rows.len() as i64;

    AnalysisStats {
        total_analyses: total,
        avg_compliance_score: (score_sum as f64 / total as f64).round() as i64,
        total_issues: rows.iter().map(|(_, issues, _)| i64::from(*issues)).sum(),
        recent_analyses: rows.iter().filter(|(_, _, at)| *at > week_ago).count() as i64,
    }
}
