use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_PROCESSING: &str = "processing";
pub const STATUS_COMPLETED: &str = "completed";
pub const STATUS_FAILED: &str = "failed";

pub const ISSUE_STATUSES: [&str; 4] = ["open", "acknowledged", "fixed", "dismissed"];

pub const PROVIDER_GOOGLE: &str = "google";

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub email_notifications: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Associations)]
#[diesel(table_name = uploaded_files)]
#[diesel(belongs_to(User))]
pub struct UploadedFile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_path: String,
    pub status: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = uploaded_files)]
pub struct NewUploadedFile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub original_filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub mime_type: String,
    pub storage_path: String,
    pub status: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Associations)]
#[diesel(table_name = file_processing_results)]
#[diesel(belongs_to(UploadedFile, foreign_key = file_id))]
pub struct ProcessingResult {
    pub id: Uuid,
    pub file_id: Uuid,
    pub extracted_text: String,
    pub word_count: i32,
    pub character_count: i32,
    pub page_count: Option<i32>,
    pub language: Option<String>,
    pub colors: Vec<String>,
    pub font_families: Vec<String>,
    pub font_sizes: Vec<f64>,
    pub extracted_images: Vec<String>,
    pub metadata: serde_json::Value,
    pub confidence_score: Option<f64>,
    pub processing_time_ms: i64,
    pub processed_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = file_processing_results)]
pub struct NewProcessingResult {
    pub id: Uuid,
    pub file_id: Uuid,
    pub extracted_text: String,
    pub word_count: i32,
    pub character_count: i32,
    pub page_count: Option<i32>,
    pub language: Option<String>,
    pub colors: Vec<String>,
    pub font_families: Vec<String>,
    pub font_sizes: Vec<f64>,
    pub extracted_images: Vec<String>,
    pub metadata: serde_json::Value,
    pub confidence_score: Option<f64>,
    pub processing_time_ms: i64,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Associations)]
#[diesel(table_name = brand_analysis_results)]
#[diesel(belongs_to(UploadedFile, foreign_key = file_id))]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub file_id: Uuid,
    pub user_id: Uuid,
    pub total_issues: i32,
    pub high_severity_issues: i32,
    pub medium_severity_issues: i32,
    pub low_severity_issues: i32,
    pub compliance_score: i32,
    pub issues: serde_json::Value,
    pub analysis_time_ms: i64,
    pub content_length: i32,
    pub rules_applied: i32,
    pub rules_snapshot: serde_json::Value,
    pub rules_checksum: String,
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = brand_analysis_results)]
pub struct NewAnalysisRecord {
    pub id: Uuid,
    pub file_id: Uuid,
    pub user_id: Uuid,
    pub total_issues: i32,
    pub high_severity_issues: i32,
    pub medium_severity_issues: i32,
    pub low_severity_issues: i32,
    pub compliance_score: i32,
    pub issues: serde_json::Value,
    pub analysis_time_ms: i64,
    pub content_length: i32,
    pub rules_applied: i32,
    pub rules_snapshot: serde_json::Value,
    pub rules_checksum: String,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Associations)]
#[diesel(table_name = analysis_issues)]
#[diesel(belongs_to(AnalysisRecord, foreign_key = analysis_id))]
pub struct IssueRecord {
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

#[derive(Debug, Insertable)]
#[diesel(table_name = analysis_issues)]
pub struct NewIssueRecord {
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
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Associations)]
#[diesel(table_name = drive_folders)]
#[diesel(belongs_to(User, foreign_key = connected_by))]
pub struct DriveFolder {
    pub id: Uuid,
    pub drive_folder_id: String,
    pub name: String,
    pub web_view_link: Option<String>,
    pub shared: bool,
    pub connected_by: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = drive_folders)]
pub struct NewDriveFolder {
    pub id: Uuid,
    pub drive_folder_id: String,
    pub name: String,
    pub web_view_link: Option<String>,
    pub shared: bool,
    pub connected_by: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Associations)]
#[diesel(table_name = drive_files)]
#[diesel(belongs_to(DriveFolder, foreign_key = drive_folder_id))]
pub struct DriveFileRecord {
    pub id: Uuid,
    pub drive_file_id: String,
    pub drive_folder_id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: Option<i64>,
    pub modified_time: Option<DateTime<Utc>>,
    pub web_view_link: Option<String>,
    pub content: Option<String>,
    pub last_synced: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = drive_files)]
pub struct NewDriveFileRecord {
    pub id: Uuid,
    pub drive_file_id: String,
    pub drive_folder_id: Uuid,
    pub name: String,
    pub mime_type: String,
    pub size_bytes: Option<i64>,
    pub modified_time: Option<DateTime<Utc>>,
    pub web_view_link: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Associations)]
#[diesel(table_name = drive_tokens)]
#[diesel(belongs_to(User))]
pub struct DriveToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DriveToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = drive_tokens)]
pub struct NewDriveToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = brand_rules_cache)]
pub struct CachedRules {
    pub checksum: String,
    pub rules: serde_json::Value,
    pub total_rules: i32,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = brand_rules_cache)]
pub struct NewCachedRules {
    pub checksum: String,
    pub rules: serde_json::Value,
    pub total_rules: i32,
}
