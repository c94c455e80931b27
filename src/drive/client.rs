use async_trait::async_trait;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::{DriveApi, DriveError, DriveFileMeta, DriveFolderMeta};

const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";
const FILE_FIELDS: &str = "id,name,mimeType,size,modifiedTime,webViewLink";
const LIST_PAGE_SIZE: &str = "100";

pub struct GoogleDriveClient {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
    size: Option<String>,
    modified_time: Option<DateTime<Utc>>,
    web_view_link: Option<String>,
    #[serde(default)]
    shared: bool,
}

impl From<FileResource> for DriveFileMeta {
    fn from(resource: FileResource) -> Self {
        Self {
            size: resource.size.and_then(|size| size.parse().ok()),
            id: resource.id,
            name: resource.name,
            mime_type: resource.mime_type,
            modified_time: resource.modified_time,
            web_view_link: resource.web_view_link,
        }
    }
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<FileResource>,
}

impl GoogleDriveClient {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, DRIVE_API_BASE)
    }

    pub fn with_base_url(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn file_url(&self, file_id: &str) -> String {
        format!(
            "{}/files/{}",
            self.base_url,
            utf8_percent_encode(file_id, NON_ALPHANUMERIC)
        )
    }

    async fn send(&self, request: RequestBuilder, item: &str) -> Result<Response, DriveError> {
        let response = request
            .send()
            .await
            .map_err(|err| DriveError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(%status, item, "drive request failed");
        Err(classify_failure(status, &body, item))
    }
}

fn classify_failure(status: StatusCode, body: &str, item: &str) -> DriveError {
    if status == StatusCode::UNAUTHORIZED || body.contains("invalid_grant") {
        return DriveError::AuthExpired;
    }
    if status == StatusCode::NOT_FOUND {
        return DriveError::NotFound(item.to_string());
    }
    DriveError::Api {
        status: status.as_u16(),
        message: api_error_message(body),
    }
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .and_then(|message| message.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}

#[async_trait]
impl DriveApi for GoogleDriveClient {
    async fn folder_metadata(
        &self,
        access_token: &str,
        folder_id: &str,
    ) -> Result<DriveFolderMeta, DriveError> {
        let request = self
            .http
            .get(self.file_url(folder_id))
            .bearer_auth(access_token)
            .query(&[("fields", "id,name,webViewLink,shared"), ("supportsAllDrives", "true")]);
        let resource: FileResource = self
            .send(request, folder_id)
            .await?
            .json()
            .await
            .map_err(|err| DriveError::Transport(err.to_string()))?;

        Ok(DriveFolderMeta {
            id: resource.id,
            name: resource.name,
            web_view_link: resource.web_view_link,
            shared: resource.shared,
        })
    }

    async fn list_folder_files(
        &self,
        access_token: &str,
        folder_id: &str,
    ) -> Result<Vec<DriveFileMeta>, DriveError> {
        let query = format!("'{}' in parents and trashed=false", folder_id.replace('\'', "\\'"));
        let fields = format!("files({FILE_FIELDS})");
        let request = self
            .http
            .get(format!("{}/files", self.base_url))
            .bearer_auth(access_token)
            .query(&[
                ("q", query.as_str()),
                ("pageSize", LIST_PAGE_SIZE),
                ("fields", fields.as_str()),
            ]);
        let list: FileList = self
            .send(request, folder_id)
            .await?
            .json()
            .await
            .map_err(|err| DriveError::Transport(err.to_string()))?;

        Ok(list.files.into_iter().map(DriveFileMeta::from).collect())
    }

    async fn file_metadata(
        &self,
        access_token: &str,
        file_id: &str,
    ) -> Result<DriveFileMeta, DriveError> {
        let request = self
            .http
            .get(self.file_url(file_id))
            .bearer_auth(access_token)
            .query(&[("fields", FILE_FIELDS)]);
        let resource: FileResource = self
            .send(request, file_id)
            .await?
            .json()
            .await
            .map_err(|err| DriveError::Transport(err.to_string()))?;

        Ok(resource.into())
    }

    async fn download(&self, access_token: &str, file_id: &str) -> Result<Vec<u8>, DriveError> {
        let request = self
            .http
            .get(self.file_url(file_id))
            .bearer_auth(access_token)
            .query(&[("alt", "media")]);
        let bytes = self
            .send(request, file_id)
            .await?
            .bytes()
            .await
            .map_err(|err| DriveError::Transport(err.to_string()))?;

        Ok(bytes.to_vec())
    }

    async fn export(
        &self,
        access_token: &str,
        file_id: &str,
        mime_type: &str,
    ) -> Result<String, DriveError> {
        let request = self
            .http
            .get(format!("{}/export", self.file_url(file_id)))
            .bearer_auth(access_token)
            .query(&[("mimeType", mime_type)]);
        self.send(request, file_id)
            .await?
            .text()
            .await
            .map_err(|err| DriveError::Transport(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_auth_failures() {
        assert!(classify_failure(StatusCode::UNAUTHORIZED, "", "f").is_auth_expired());
        assert!(
            classify_failure(StatusCode::BAD_REQUEST, r#"{"error":"invalid_grant"}"#, "f")
                .is_auth_expired()
        );
    }

    #[test]
    fn extracts_google_error_message() {
        let body = r#"{"error":{"code":403,"message":"The user does not have sufficient permissions"}}"#;
        match classify_failure(StatusCode::FORBIDDEN, body, "file-1") {
            DriveError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "The user does not have sufficient permissions");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn file_resource_parses_string_size() {
        let resource: FileResource = serde_json::from_str(
            r#"{"id":"1","name":"Voice.docx","mimeType":"text/plain","size":"2048",
                "modifiedTime":"2024-05-01T10:00:00.000Z"}"#,
        )
        .unwrap();
        let meta = DriveFileMeta::from(resource);
        assert_eq!(meta.size, Some(2048));
        assert!(meta.modified_time.is_some());
    }
}
