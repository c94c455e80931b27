use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AdminUser;
use crate::error::{AppError, AppResult};
use crate::models::{User, ROLE_ADMIN, ROLE_USER};
use crate::repo;
use crate::repo::files::{FileStats, FileWithOwner, ADMIN_RECENT_LIMIT};
use crate::rules::{BrandRules, RulesService, RulesSummary};
use crate::state::AppState;

use super::files::FileSummary;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBody {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub email_notifications: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserBody {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            email_notifications: user.email_notifications,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserListResponse {
    pub users: Vec<UserBody>,
}

#[derive(Debug, Deserialize)]
pub struct RoleChangeRequest {
    pub email: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RoleChangeResponse {
    pub message: &'static str,
    pub user: UserBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandRulesResponse {
    pub brand_rules: BrandRules,
    pub summary: RulesSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_users: i64,
    pub files_processed: i64,
    pub storage_used: i64,
    pub total_analyses: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub stats: DashboardStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsSummary {
    pub word_count: i32,
    pub character_count: i32,
    pub colors: Vec<String>,
    pub confidence_score: Option<f64>,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminFileBody {
    #[serde(flatten)]
    pub file: FileSummary,
    pub user_id: Uuid,
    pub owner_email: String,
    pub results: Option<ResultsSummary>,
}

impl From<FileWithOwner> for AdminFileBody {
    fn from(row: FileWithOwner) -> Self {
        Self {
            user_id: row.file.user_id,
            file: row.file.into(),
            owner_email: row.owner_email,
            results: row.results.map(|results| ResultsSummary {
                word_count: results.word_count,
                character_count: results.character_count,
                colors: results.colors,
                confidence_score: results.confidence_score,
                processed_at: results.processed_at,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminFilesResponse {
    pub files: Vec<AdminFileBody>,
    pub stats: FileStats,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEmailRequest {
    #[serde(alias = "testEmail")]
    pub email: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TestEmailResponse {
    pub success: bool,
    pub message: String,
}

pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<UserListResponse>> {
    let mut conn = state.db()?;
    let users = repo::users::list_all(&mut conn)?;
    Ok(Json(UserListResponse {
        users: users.into_iter().map(UserBody::from).collect(),
    }))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<RoleChangeRequest>,
) -> AppResult<Json<RoleChangeResponse>> {
    let email = payload
        .email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty());
    let role = payload
        .role
        .filter(|role| role == ROLE_USER || role == ROLE_ADMIN);
    let (Some(email), Some(role)) = (email, role) else {
        return Err(AppError::bad_request("Invalid email or role"));
    };

    let mut conn = state.db()?;
    let user = repo::users::set_role_by_email(&mut conn, &email, &role)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    info!(admin_id = %admin.id, user_id = %user.id, role = %user.role, "user role updated");

    Ok(Json(RoleChangeResponse {
        message: "User role updated successfully",
        user: user.into(),
    }))
}

pub async fn brand_rules(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> AppResult<Json<BrandRulesResponse>> {
    let mut conn = state.db()?;
    let rules = RulesService::aggregate_for_user(&mut conn, admin.id)?;
    Ok(Json(BrandRulesResponse {
        summary: RulesSummary::of(&rules),
        brand_rules: rules,
    }))
}

pub async fn dashboard(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<DashboardResponse>> {
    let mut conn = state.db()?;
    let total_users = repo::users::count(&mut conn)?;
    let files = repo::files::file_stats(&mut conn)?;
    let total_analyses = repo::analyses::count_all(&mut conn)?;

    Ok(Json(DashboardResponse {
        stats: DashboardStats {
            total_users,
            files_processed: files.completed,
            storage_used: files.total_size,
            total_analyses,
        },
    }))
}

pub async fn list_files(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> AppResult<Json<AdminFilesResponse>> {
    let mut conn = state.db()?;
    let files = repo::files::list_recent_with_results(&mut conn, ADMIN_RECENT_LIMIT)?;
    let stats = repo::files::file_stats(&mut conn)?;
    Ok(Json(AdminFilesResponse {
        files: files.into_iter().map(AdminFileBody::from).collect(),
        stats,
    }))
}

pub async fn send_test_email(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    payload: Option<Json<TestEmailRequest>>,
) -> Response {
    let request = payload.map(|Json(body)| body).unwrap_or_default();
    let to = request
        .email
        .map(|email| email.trim().to_string())
        .filter(|email| !email.is_empty())
        .unwrap_or_else(|| admin.email.clone());

    if state.notifier.send_test_email(&to).await {
        let body = TestEmailResponse {
            success: true,
            message: format!("Test email sent successfully to {to}"),
        };
        (StatusCode::OK, Json(body)).into_response()
    } else {
        warn!(admin_id = %admin.id, "test email failed");
        let body = TestEmailResponse {
            success: false,
            message: "Failed to send test email".to_string(),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}
