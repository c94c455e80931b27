use std::time::Instant;

use axum::extract::{Json, Multipart, Path, State};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::extract::{self, ExtractedContent};
use crate::models::{
    NewProcessingResult, NewUploadedFile, ProcessingResult, UploadedFile, STATUS_COMPLETED,
    STATUS_FAILED, STATUS_PENDING, STATUS_PROCESSING,
};
use crate::repo;
use crate::state::AppState;
use crate::storage::upload_key;

use super::parse_id;

const FILES_FIELD: &str = "files";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub id: Uuid,
    pub filename: String,
    pub file_type: String,
    pub file_size: i64,
    pub mime_type: String,
    pub status: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<UploadedFile> for FileSummary {
    fn from(file: UploadedFile) -> Self {
        Self {
            id: file.id,
            filename: file.original_filename,
            file_type: file.file_type,
            file_size: file.file_size,
            mime_type: file.mime_type,
            status: file.status,
            uploaded_at: file.uploaded_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResultResponse {
    pub id: Uuid,
    pub extracted_text: String,
    pub word_count: i32,
    pub character_count: i32,
    pub page_count: Option<i32>,
    pub language: Option<String>,
    pub colors: Vec<String>,
    pub font_families: Vec<String>,
    pub font_sizes: Vec<f64>,
    pub extracted_images: Vec<String>,
    pub metadata: Value,
    pub confidence_score: Option<f64>,
    pub processing_time_ms: i64,
    pub processed_at: DateTime<Utc>,
}

impl From<ProcessingResult> for ProcessingResultResponse {
    fn from(result: ProcessingResult) -> Self {
        Self {
            id: result.id,
            extracted_text: result.extracted_text,
            word_count: result.word_count,
            character_count: result.character_count,
            page_count: result.page_count,
            language: result.language,
            colors: result.colors,
            font_families: result.font_families,
            font_sizes: result.font_sizes,
            extracted_images: result.extracted_images,
            metadata: result.metadata,
            confidence_score: result.confidence_score,
            processing_time_ms: result.processing_time_ms,
            processed_at: result.processed_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileSummary>,
}

#[derive(Debug, Serialize)]
pub struct FileDetailResponse {
    pub file: FileSummary,
    pub results: Option<ProcessingResultResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsingSummary {
    pub success: bool,
    pub text_length: usize,
    pub word_count: usize,
    pub colors: usize,
    pub processing_time: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<Uuid>,
    pub filename: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsing: Option<ParsingSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadOutcome {
    fn failed(file_id: Option<Uuid>, filename: &str, error: impl Into<String>) -> Self {
        Self {
            file_id,
            filename: filename.to_string(),
            status: STATUS_FAILED,
            parsing: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: &'static str,
    pub results: Vec<UploadOutcome>,
    pub total_files: usize,
    pub success_count: usize,
    pub failed_count: usize,
}

struct UploadPart {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

pub async fn process_uploads(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        error!(error = %err, "invalid multipart data");
        AppError::bad_request(format!("invalid multipart data: {err}"))
    })? {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|err| {
            error!(error = %err, filename = %filename, "failed to read upload bytes");
            AppError::bad_request(format!("failed to read file bytes: {err}"))
        })?;
        parts.push(UploadPart {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    if parts.is_empty() {
        return Err(AppError::bad_request("No files provided"));
    }

    let total_files = parts.len();
    let mut results = Vec::with_capacity(total_files);
    for part in parts {
        results.push(process_one(&state, &user, part).await);
    }

    let success_count = results
        .iter()
        .filter(|outcome| outcome.status == STATUS_COMPLETED)
        .count();
    info!(
        user_id = %user.id,
        total_files,
        success_count,
        "processed upload batch"
    );

    Ok(Json(UploadResponse {
        message: "Files processed",
        failed_count: total_files - success_count,
        success_count,
        total_files,
        results,
    }))
}

async fn process_one(state: &AppState, user: &AuthenticatedUser, part: UploadPart) -> UploadOutcome {
    let file_id = Uuid::new_v4();
    let mime_type = extract::resolve_mime_type(part.content_type.as_deref(), &part.filename);
    let storage_path = upload_key(user.id, file_id, &part.filename);

    if let Err(err) = state
        .storage
        .put_object(&storage_path, part.bytes.clone(), &mime_type)
        .await
    {
        error!(%file_id, error = %err, "failed to store upload");
        return UploadOutcome::failed(None, &part.filename, format!("Failed to store file: {err}"));
    }

    let new_file = NewUploadedFile {
        id: file_id,
        user_id: user.id,
        original_filename: part.filename.clone(),
        file_type: extract::file_extension(&part.filename).unwrap_or_else(|| "unknown".into()),
        file_size: i64::try_from(part.bytes.len()).unwrap_or(i64::MAX),
        mime_type: mime_type.clone(),
        storage_path,
        status: STATUS_PENDING.to_string(),
    };
    let saved = state.db().and_then(|mut conn| {
        let saved = repo::files::insert_uploaded_file(&mut conn, &new_file)?;
        repo::files::update_status(&mut conn, saved.id, STATUS_PROCESSING)?;
        Ok(saved)
    });
    if let Err(err) = saved {
        error!(%file_id, error = %err, "failed to save file record");
        return UploadOutcome::failed(None, &part.filename, "Failed to save file record");
    }

    let started = Instant::now();
    let parsed = parse_with_timeout(state, &part.filename, &mime_type, part.bytes).await;
    let processing_time = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

    match parsed {
        Ok(content) => match save_results(state, file_id, &content, processing_time) {
            Ok(()) => UploadOutcome {
                file_id: Some(file_id),
                filename: part.filename,
                status: STATUS_COMPLETED,
                parsing: Some(ParsingSummary {
                    success: true,
                    text_length: content.text.chars().count(),
                    word_count: content.metadata.word_count,
                    colors: content.metadata.colors.as_ref().map_or(0, Vec::len),
                    processing_time,
                }),
                error: None,
            },
            Err(err) => {
                error!(%file_id, error = %err, "failed to save processing result");
                mark_failed(state, file_id);
                UploadOutcome::failed(Some(file_id), &part.filename, "Failed to save processing result")
            }
        },
        Err(message) => {
            warn!(%file_id, error = %message, "file parsing failed");
            mark_failed(state, file_id);
            UploadOutcome::failed(Some(file_id), &part.filename, message)
        }
    }
}

/// Runs extraction on the blocking pool. A timed out task is left to finish in the background.
async fn parse_with_timeout(
    state: &AppState,
    filename: &str,
    mime_type: &str,
    bytes: Vec<u8>,
) -> Result<ExtractedContent, String> {
    let timeout = state.config.parse_timeout();
    let task_filename = filename.to_string();
    let task_mime = mime_type.to_string();
    let task = tokio::task::spawn_blocking(move || {
        extract::extract_upload(&task_filename, &task_mime, &bytes)
    });

    match tokio::time::timeout(timeout, task).await {
        Err(_) => Err(format!(
            "File parsing timeout after {} seconds",
            timeout.as_secs()
        )),
        Ok(Err(join_err)) => Err(format!("File parsing task failed: {join_err}")),
        Ok(Ok(Err(err))) => Err(err.to_string()),
        Ok(Ok(Ok(content))) => Ok(content),
    }
}

fn clamp_i32(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn save_results(
    state: &AppState,
    file_id: Uuid,
    content: &ExtractedContent,
    processing_time_ms: i64,
) -> AppResult<()> {
    let metadata = &content.metadata;
    let record = NewProcessingResult {
        id: Uuid::new_v4(),
        file_id,
        extracted_text: content.text.clone(),
        word_count: clamp_i32(metadata.word_count),
        character_count: clamp_i32(metadata.character_count),
        page_count: metadata.page_count.map(|pages| i32::try_from(pages).unwrap_or(i32::MAX)),
        language: metadata.language.clone(),
        colors: metadata.colors.clone().unwrap_or_default(),
        font_families: metadata.font_families.clone().unwrap_or_default(),
        font_sizes: metadata.font_sizes.clone().unwrap_or_default(),
        extracted_images: metadata.extracted_images.clone().unwrap_or_default(),
        metadata: content.raw_data.clone(),
        confidence_score: content.raw_data.get("confidence").and_then(Value::as_f64),
        processing_time_ms,
    };

    let mut conn = state.db()?;
    repo::files::save_processing_result(&mut conn, &record)?;
    repo::files::update_status(&mut conn, file_id, STATUS_COMPLETED)?;
    Ok(())
}

fn mark_failed(state: &AppState, file_id: Uuid) {
    let updated = state
        .db()
        .and_then(|mut conn| Ok(repo::files::update_status(&mut conn, file_id, STATUS_FAILED)?));
    if let Err(err) = updated {
        error!(%file_id, error = %err, "failed to mark file as failed");
    }
}

pub async fn list_files(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<FileListResponse>> {
    let mut conn = state.db()?;
    let files = repo::files::list_by_user(&mut conn, user.id)?;
    Ok(Json(FileListResponse {
        files: files.into_iter().map(FileSummary::from).collect(),
    }))
}

/// Loads a file the caller owns, or any file for admins.
pub(crate) fn load_accessible_file(
    state: &AppState,
    user: &AuthenticatedUser,
    file_id: Uuid,
) -> AppResult<(UploadedFile, Option<ProcessingResult>)> {
    let mut conn = state.db()?;
    let (file, results) = repo::files::find_with_results(&mut conn, file_id)?
        .ok_or_else(|| AppError::not_found("File not found"))?;
    if !user.can_access(file.user_id) {
        return Err(AppError::forbidden("Access denied"));
    }
    Ok((file, results))
}

pub async fn get_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(file_id): Path<String>,
) -> AppResult<Json<FileDetailResponse>> {
    let file_id = parse_id(&file_id, "File not found")?;
    let (file, results) = load_accessible_file(&state, &user, file_id)?;
    Ok(Json(FileDetailResponse {
        file: file.into(),
        results: results.map(ProcessingResultResponse::from),
    }))
}
