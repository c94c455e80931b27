//! Google Drive access used for brand guideline folders.

pub mod client;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

pub use client::GoogleDriveClient;

#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("Drive authentication expired")]
    AuthExpired,
    #[error("Drive item not found: {0}")]
    NotFound(String),
    #[error("Drive API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Drive request failed: {0}")]
    Transport(String),
}

impl DriveError {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, DriveError::AuthExpired)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFolderMeta {
    pub id: String,
    pub name: String,
    pub web_view_link: Option<String>,
    pub shared: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFileMeta {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: Option<i64>,
    pub modified_time: Option<DateTime<Utc>>,
    pub web_view_link: Option<String>,
}

#[async_trait]
pub trait DriveApi: Send + Sync + 'static {
    async fn folder_metadata(
        &self,
        access_token: &str,
        folder_id: &str,
    ) -> Result<DriveFolderMeta, DriveError>;

    /// Non-trashed direct children of a folder, at most one page of 100.
    async fn list_folder_files(
        &self,
        access_token: &str,
        folder_id: &str,
    ) -> Result<Vec<DriveFileMeta>, DriveError>;

    async fn file_metadata(
        &self,
        access_token: &str,
        file_id: &str,
    ) -> Result<DriveFileMeta, DriveError>;

    async fn download(&self, access_token: &str, file_id: &str) -> Result<Vec<u8>, DriveError>;

    /// Exports a native Google document to `mime_type`.
    async fn export(
        &self,
        access_token: &str,
        file_id: &str,
        mime_type: &str,
    ) -> Result<String, DriveError>;
}
