use std::collections::HashMap;

use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{
    NewProcessingResult, NewUploadedFile, ProcessingResult, UploadedFile, STATUS_COMPLETED,
    STATUS_FAILED, STATUS_PENDING, STATUS_PROCESSING,
};
use crate::schema::{file_processing_results, uploaded_files, users};

pub const ADMIN_RECENT_LIMIT: i64 = 100;

pub struct FileWithOwner {
    pub file: UploadedFile,
    pub owner_email: String,
    pub results: Option<ProcessingResult>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    pub total: i64,
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub total_size: i64,
    pub types: FileTypeBuckets,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct FileTypeBuckets {
    pub images: i64,
    pub pdfs: i64,
    pub documents: i64,
    pub other: i64,
}

pub fn insert_uploaded_file(
    conn: &mut PgConnection,
    new_file: &NewUploadedFile,
) -> QueryResult<UploadedFile> {
    diesel::insert_into(uploaded_files::table)
        .values(new_file)
        .get_result(conn)
}

pub fn update_status(conn: &mut PgConnection, file_id: Uuid, status: &str) -> QueryResult<usize> {
    diesel::update(uploaded_files::table.find(file_id))
        .set(uploaded_files::status.eq(status))
        .execute(conn)
}

pub fn save_processing_result(
    conn: &mut PgConnection,
    result: &NewProcessingResult,
) -> QueryResult<ProcessingResult> {
    diesel::insert_into(file_processing_results::table)
        .values(result)
        .get_result(conn)
}

pub fn find_with_results(
    conn: &mut PgConnection,
    file_id: Uuid,
) -> QueryResult<Option<(UploadedFile, Option<ProcessingResult>)>> {
    let Some(file) = uploaded_files::table
        .find(file_id)
        .first::<UploadedFile>(conn)
        .optional()?
    else {
        return Ok(None);
    };

    let results = file_processing_results::table
        .filter(file_processing_results::file_id.eq(file_id))
        .first::<ProcessingResult>(conn)
        .optional()?;

    Ok(Some((file, results)))
}

pub fn list_by_user(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Vec<UploadedFile>> {
    uploaded_files::table
        .filter(uploaded_files::user_id.eq(user_id))
        .order(uploaded_files::uploaded_at.desc())
        .load(conn)
}

pub fn list_by_status(conn: &mut PgConnection, status: &str) -> QueryResult<Vec<UploadedFile>> {
    uploaded_files::table
        .filter(uploaded_files::status.eq(status))
        .order(uploaded_files::uploaded_at.asc())
        .load(conn)
}

pub fn list_recent_with_results(
    conn: &mut PgConnection,
    limit: i64,
) -> QueryResult<Vec<FileWithOwner>> {
    let rows: Vec<(UploadedFile, String)> = uploaded_files::table
        .inner_join(users::table)
        .order(uploaded_files::uploaded_at.desc())
        .limit(limit)
        .select((UploadedFile::as_select(), users::email))
        .load(conn)?;

    let ids: Vec<Uuid> = rows.iter().map(|(file, _)| file.id).collect();
    let mut results: HashMap<Uuid, ProcessingResult> = file_processing_results::table
        .filter(file_processing_results::file_id.eq_any(ids))
        .load::<ProcessingResult>(conn)?
        .into_iter()
        .map(|result| (result.file_id, result))
        .collect();

    Ok(rows
        .into_iter()
        .map(|(file, owner_email)| {
            let results = results.remove(&file.id);
            FileWithOwner {
                file,
                owner_email,
                results,
            }
        })
        .collect())
}

pub fn file_stats(conn: &mut PgConnection) -> QueryResult<FileStats> {
    let rows: Vec<(String, i64, String)> = uploaded_files::table
        .select((
            uploaded_files::status,
            uploaded_files::file_size,
            uploaded_files::mime_type,
        ))
        .load(conn)?;

    Ok(tally(rows))
}

fn tally(rows: Vec<(String, i64, String)>) -> FileStats {
    let mut stats = FileStats::default();
    for (status, size, mime_type) in rows {
        stats.total += 1;
        stats.total_size += size;
        match status.as_str() {
            STATUS_PENDING => stats.pending += 1,
            STATUS_PROCESSING => stats.processing += 1,
            STATUS_COMPLETED => stats.completed += 1,
            STATUS_FAILED => stats.failed += 1,
            _ => {}
        }

        let mime = mime_type.to_ascii_lowercase();
        if mime.starts_with("image/") {
            stats.types.images += 1;
        } else if mime == "application/pdf" {
            stats.types.pdfs += 1;
        } else if mime.starts_with("text/") || mime.contains("word") || mime.contains("document")
        {
            stats.types.documents += 1;
        } else {
            stats.types.other += 1;
        }
    }
    stats
}
