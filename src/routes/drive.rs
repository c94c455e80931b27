use axum::extract::{Json, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::drive::{DriveError, DriveFileMeta};
use crate::error::{AppError, AppResult};
use crate::extract::{extract_guidelines, GuidelineKind};
use crate::models::{DriveFolder, NewDriveFileRecord, NewDriveFolder, PROVIDER_GOOGLE};
use crate::oauth::{self, OAuthError, DRIVE_SCOPES};
use crate::repo;
use crate::state::AppState;

use super::parse_id;

const AUTH_EXPIRED_MESSAGE: &str = "Drive authentication expired. Please reconnect to Google Drive.";
const RECONNECT_SUGGESTION: &str =
    "Please reconnect to Google Drive to refresh your authentication.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderBody {
    pub id: Uuid,
    pub drive_folder_id: String,
    pub name: String,
    pub web_view_link: Option<String>,
    pub shared: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DriveFolder> for FolderBody {
    fn from(folder: DriveFolder) -> Self {
        Self {
            id: folder.id,
            drive_folder_id: folder.drive_folder_id,
            name: folder.name,
            web_view_link: folder.web_view_link,
            shared: folder.shared,
            is_active: folder.is_active,
            created_at: folder.created_at,
            updated_at: folder.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRef {
    pub id: Uuid,
    pub name: String,
    pub drive_folder_id: String,
}

impl From<&DriveFolder> for FolderRef {
    fn from(folder: &DriveFolder) -> Self {
        Self {
            id: folder.id,
            name: folder.name.clone(),
            drive_folder_id: folder.drive_folder_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FolderListResponse {
    pub folders: Vec<FolderBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFolderRequest {
    pub drive_folder_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FolderResponse {
    pub message: &'static str,
    pub folder: FolderBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    pub folder_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub message: &'static str,
    pub deactivated: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandFileBody {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub web_view_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

impl From<DriveFileMeta> for BrandFileBody {
    fn from(file: DriveFileMeta) -> Self {
        Self {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            web_view_link: file.web_view_link,
            size: file.size,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BrandFilesResponse {
    pub files: Vec<BrandFileBody>,
    pub folder: FolderRef,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub synced: usize,
    pub failed: usize,
    pub folder: FolderRef,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleApiDiagnostic {
    pub client_id_configured: bool,
    pub client_secret_configured: bool,
    pub redirect_uri_configured: bool,
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveDiagnostic {
    pub folders_connected: usize,
    pub token_exists: bool,
    pub active_folder: Option<FolderRef>,
    pub available_folders: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub user: DiagnosticUser,
    pub google_api: GoogleApiDiagnostic,
    pub drive: DriveDiagnostic,
}

#[derive(Debug, Serialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub message: &'static str,
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticResponse {
    pub diagnostic: Diagnostic,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUrlResponse {
    pub auth_url: String,
}

fn drive_error(err: DriveError) -> AppError {
    match err {
        DriveError::AuthExpired => AppError::unauthorized(AUTH_EXPIRED_MESSAGE),
        DriveError::NotFound(message) => AppError::not_found(message),
        other => AppError::internal(other),
    }
}

fn oauth_error(err: OAuthError) -> AppError {
    match err {
        OAuthError::TokenExchange(message) if message.contains("invalid_grant") => {
            AppError::unauthorized(AUTH_EXPIRED_MESSAGE)
        }
        other => AppError::internal(other),
    }
}

fn missing_tokens() -> AppError {
    AppError::unauthorized("Google Drive authentication expired or missing.")
        .with_diagnostic("MISSING_DRIVE_TOKENS")
        .with_field("suggestion", RECONNECT_SUGGESTION)
}

/// The caller's usable Google access token or a 401 asking them to reconnect.
async fn require_token(state: &AppState, user: &AuthenticatedUser) -> AppResult<String> {
    oauth::valid_access_token(&state.pool, state.oauth.as_ref(), user.id)
        .await
        .map_err(oauth_error)?
        .ok_or_else(missing_tokens)
}

/// The caller's active folder, with the not-connected and not-selected cases
/// turned into 404s.
fn require_active_folder(state: &AppState, user: &AuthenticatedUser) -> AppResult<DriveFolder> {
    let mut conn = state.db()?;
    let folders = repo::drive::list_folders(&mut conn, user.id)?;
    if folders.is_empty() {
        return Err(AppError::not_found(
            "No Google Drive connection found. Please connect to Google Drive first.",
        )
        .with_diagnostic("NO_DRIVE_CONNECTION"));
    }

    match folders.iter().find(|folder| folder.is_active) {
        Some(folder) => Ok(folder.clone()),
        None => {
            let names: Vec<String> = folders.into_iter().map(|folder| folder.name).collect();
            Err(AppError::not_found("No active brand guidelines folder selected.")
                .with_diagnostic("MISSING_BRAND_FOLDER")
                .with_field("availableFolders", names)
                .with_field(
                    "suggestion",
                    "Activate one of your connected Drive folders as the brand guidelines folder.",
                ))
        }
    }
}

async fn supported_files(
    state: &AppState,
    token: &str,
    folder: &DriveFolder,
) -> AppResult<Vec<DriveFileMeta>> {
    let files = state
        .drive
        .list_folder_files(token, &folder.drive_folder_id)
        .await
        .map_err(drive_error)?;
    Ok(files
        .into_iter()
        .filter(|file| GuidelineKind::is_supported(&file.mime_type))
        .collect())
}

fn parse_folder_id(raw: Option<&str>) -> AppResult<Uuid> {
    let raw = raw
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("Folder ID is required"))?;
    parse_id(raw, "Folder not found")
}

pub async fn list_folders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<FolderListResponse>> {
    let mut conn = state.db()?;
    let folders = repo::drive::list_folders(&mut conn, user.id)?;
    Ok(Json(FolderListResponse {
        folders: folders.into_iter().map(FolderBody::from).collect(),
    }))
}

pub async fn register_folder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<RegisterFolderRequest>,
) -> AppResult<Json<FolderResponse>> {
    let drive_folder_id = payload
        .drive_folder_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::bad_request("Folder ID is required"))?;

    let token = require_token(&state, &user).await?;
    let meta = state
        .drive
        .folder_metadata(&token, &drive_folder_id)
        .await
        .map_err(drive_error)?;

    let mut conn = state.db()?;
    let folder = repo::drive::upsert_folder(
        &mut conn,
        &NewDriveFolder {
            id: Uuid::new_v4(),
            drive_folder_id: meta.id,
            name: meta.name,
            web_view_link: meta.web_view_link,
            shared: meta.shared,
            connected_by: user.id,
        },
    )?;
    info!(user_id = %user.id, folder_id = %folder.id, "registered drive folder");

    Ok(Json(FolderResponse {
        message: "Folder connected successfully",
        folder: folder.into(),
    }))
}

pub async fn activate_folder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ActivateRequest>,
) -> AppResult<Json<FolderResponse>> {
    let folder_id = parse_folder_id(payload.folder_id.as_deref())?;

    let mut conn = state.db()?;
    let folder = repo::drive::activate_folder(&mut conn, user.id, folder_id)?
        .ok_or_else(|| AppError::not_found("Folder not found"))?;
    info!(user_id = %user.id, folder_id = %folder.id, "activated drive folder");

    Ok(Json(FolderResponse {
        message: "Folder activated successfully",
        folder: folder.into(),
    }))
}

pub async fn deactivate_folders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<DeactivateResponse>> {
    let mut conn = state.db()?;
    let deactivated = repo::drive::deactivate_all(&mut conn, user.id)?;
    info!(user_id = %user.id, deactivated, "deactivated drive folders");
    Ok(Json(DeactivateResponse {
        message: "Folders deactivated successfully",
        deactivated,
    }))
}

pub async fn brand_files(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<BrandFilesResponse>> {
    let folder = require_active_folder(&state, &user)?;
    let token = require_token(&state, &user).await?;
    let files = supported_files(&state, &token, &folder).await?;
    info!(user_id = %user.id, folder = %folder.name, count = files.len(), "listed brand files");

    Ok(Json(BrandFilesResponse {
        files: files.into_iter().map(BrandFileBody::from).collect(),
        folder: FolderRef::from(&folder),
    }))
}

/// Re-extracts every supported file of the active folder into `drive_files`.
pub async fn sync_folder(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<SyncResponse>> {
    let folder = require_active_folder(&state, &user)?;
    let token = require_token(&state, &user).await?;
    let files = supported_files(&state, &token, &folder).await?;

    let mut records = Vec::with_capacity(files.len());
    let mut failed = 0;
    for file in files {
        match extract_guidelines(state.drive.as_ref(), &token, &file.id).await {
            Ok(guidelines) => records.push(NewDriveFileRecord {
                id: Uuid::new_v4(),
                drive_file_id: file.id,
                drive_folder_id: folder.id,
                name: file.name,
                mime_type: file.mime_type,
                size_bytes: file.size,
                modified_time: file.modified_time,
                web_view_link: file.web_view_link,
                content: Some(guidelines.content),
            }),
            Err(err) => {
                warn!(file_id = %file.id, name = %file.name, error = %err, "skipping brand file");
                failed += 1;
            }
        }
    }

    let mut conn = state.db()?;
    let synced = repo::drive::replace_folder_files(&mut conn, folder.id, &records)?;
    info!(user_id = %user.id, folder_id = %folder.id, synced, failed, "synced brand folder");

    Ok(Json(SyncResponse {
        synced,
        failed,
        folder: FolderRef::from(&folder),
    }))
}

fn recommendations(diagnostic: &Diagnostic) -> Vec<Recommendation> {
    let google = &diagnostic.google_api;
    let drive = &diagnostic.drive;
    let mut out = Vec::new();

    if !google.client_id_configured || !google.client_secret_configured {
        out.push(Recommendation {
            kind: "error",
            message: "Google API credentials not configured properly",
            action: "Check GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET environment variables".into(),
        });
    }
    if !drive.token_exists {
        out.push(Recommendation {
            kind: "warning",
            message: "No Google Drive authentication found",
            action: "Click \"Connect Drive\" to authenticate with Google Drive".into(),
        });
    }
    if drive.folders_connected == 0 {
        out.push(Recommendation {
            kind: "info",
            message: "No drive folders connected",
            action: "Connect to Google Drive to access your folders".into(),
        });
    } else if drive.active_folder.is_none() {
        out.push(Recommendation {
            kind: "warning",
            message: "No active brand guidelines folder",
            action: format!(
                "Activate one of your folders. Available folders: {}",
                drive.available_folders.join(", ")
            ),
        });
    }
    if out.is_empty() {
        out.push(Recommendation {
            kind: "success",
            message: "All systems configured correctly",
            action: "You should be able to select brand files from your active folder".into(),
        });
    }
    out
}

pub async fn diagnostic(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<DiagnosticResponse>> {
    let mut conn = state.db()?;
    let folders = repo::drive::list_folders(&mut conn, user.id)?;
    let token_exists = repo::drive::get_tokens(&mut conn, user.id, PROVIDER_GOOGLE)?.is_some();
    let config = &state.config;

    let diagnostic = Diagnostic {
        user: DiagnosticUser {
            id: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
        },
        google_api: GoogleApiDiagnostic {
            client_id_configured: config.google_client_id.is_some(),
            client_secret_configured: config.google_client_secret.is_some(),
            redirect_uri_configured: config.google_redirect_uri.is_some(),
            redirect_uri: config.google_redirect_uri.clone(),
        },
        drive: DriveDiagnostic {
            folders_connected: folders.len(),
            token_exists,
            active_folder: folders
                .iter()
                .find(|folder| folder.is_active)
                .map(FolderRef::from),
            available_folders: folders.iter().map(|folder| folder.name.clone()).collect(),
        },
    };
    let recommendations = recommendations(&diagnostic);

    Ok(Json(DiagnosticResponse {
        diagnostic,
        recommendations,
    }))
}

pub async fn auth_url(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Response> {
    let config = &state.config;
    let Some(client_id) = config.google_client_id.as_deref() else {
        return Err(AppError::internal(
            "Google Drive integration not configured: GOOGLE_CLIENT_ID missing",
        )
        .with_diagnostic("MISSING_CLIENT_ID"));
    };
    if config.google_client_secret.is_none() {
        return Err(AppError::internal(
            "Google Drive integration not configured: GOOGLE_CLIENT_SECRET missing",
        )
        .with_diagnostic("MISSING_CLIENT_SECRET"));
    }

    let redirect_uri = config
        .google_redirect_uri
        .clone()
        .unwrap_or_else(|| config.expected_redirect_uri());
    let state_token = oauth::generate_state();
    let url = oauth::build_auth_url(client_id, &redirect_uri, &DRIVE_SCOPES, &state_token);
    info!(user_id = %user.id, "issued drive auth url");

    Ok((
        StatusCode::OK,
        [(
            header::SET_COOKIE,
            oauth::state_cookie(&state_token, config.oauth_cookie_secure),
        )],
        Json(AuthUrlResponse { auth_url: url }),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diagnostic(token_exists: bool, folders: Vec<&str>, active: bool) -> Diagnostic {
        Diagnostic {
            user: DiagnosticUser {
                id: Uuid::nil(),
                email: "a@example.com".into(),
                role: "user".into(),
            },
            google_api: GoogleApiDiagnostic {
                client_id_configured: true,
                client_secret_configured: true,
                redirect_uri_configured: true,
                redirect_uri: None,
            },
            drive: DriveDiagnostic {
                folders_connected: folders.len(),
                token_exists,
                active_folder: active.then(|| FolderRef {
                    id: Uuid::nil(),
                    name: "Brand".into(),
                    drive_folder_id: "d1".into(),
                }),
                available_folders: folders.into_iter().map(String::from).collect(),
            },
        }
    }

    #[test]
    fn healthy_setup_recommends_success() {
        let recs = recommendations(&diagnostic(true, vec!["Brand"], true));
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].kind, "success");
    }

    #[test]
    fn missing_token_and_folder_are_reported() {
        let recs = recommendations(&diagnostic(false, vec![], false));
        let kinds: Vec<_> = recs.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec!["warning", "info"]);
    }

    #[test]
    fn inactive_folders_are_listed() {
        let recs = recommendations(&diagnostic(true, vec!["A", "B"], false));
        assert_eq!(recs[0].kind, "warning");
        assert!(recs[0].action.ends_with("A, B"));
    }

    #[test]
    fn expired_grant_maps_to_unauthorized() {
        let err = oauth_error(OAuthError::TokenExchange("invalid_grant".into()));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.message(), AUTH_EXPIRED_MESSAGE);
        assert_eq!(drive_error(DriveError::AuthExpired).status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn folder_id_is_required() {
        assert_eq!(parse_folder_id(None).unwrap_err().status(), StatusCode::BAD_REQUEST);
        assert_eq!(parse_folder_id(Some("  ")).unwrap_err().status(), StatusCode::BAD_REQUEST);
        assert_eq!(parse_folder_id(Some("nope")).unwrap_err().status(), StatusCode::NOT_FOUND);
    }
}
