use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use brand_guard::analysis::{LlmClient, LlmError};
use brand_guard::auth::jwt::JwtAuthProvider;
use brand_guard::config::AppConfig;
use brand_guard::db::{self, PgPool};
use brand_guard::drive::{DriveApi, DriveError, DriveFileMeta, DriveFolderMeta};
use brand_guard::email::{EmailError, EmailMessage, EmailSender};
use brand_guard::oauth::{OAuthClient, OAuthError, TokenResponse};
use brand_guard::routes;
use brand_guard::state::{AppState, Integrations};
use brand_guard::storage::ObjectStorage;
use diesel::connection::SimpleConnection;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test-secret";
pub const ADMIN_DOMAIN: &str = "@admin.test";
pub const GOOD_CODE: &str = "good-code";

/// Issues returned by [`FakeLlm`] for every prompt.
pub const LLM_ISSUES: &str = r#"Here you go:
[
  {"type":"banned_word","severity":"high","message":"Uses 'cheap'","location":{"line":1,"context":"cheap"},"suggestion":"Use 'affordable'","ruleViolated":"Banned words"},
  {"type":"tone_violation","severity":"low","message":"Too casual","ruleViolated":"Voice"}
]"#;

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[allow(dead_code)]
#[derive(Clone)]
pub struct StoredObject {
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, StoredObject>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let stored = StoredObject {
            key: key.to_string(),
            bytes,
            content_type: content_type.to_string(),
        };
        let mut guard = self.objects.lock().await;
        guard.insert(stored.key.clone(), stored);
        Ok(())
    }

    async fn presign_get_object(&self, key: &str, expires_in: Duration) -> Result<String> {
        let guard = self.objects.lock().await;
        ensure!(guard.contains_key(key), "object {key} missing");
        Ok(format!(
            "https://fake-storage/{key}?expires_in={}",
            expires_in.as_secs()
        ))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let mut guard = self.objects.lock().await;
        guard.remove(key);
        Ok(())
    }
}

impl FakeStorage {
    #[allow(dead_code)]
    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        let guard = self.objects.lock().await;
        guard.get(key).cloned()
    }

    #[allow(dead_code)]
    pub async fn object_count(&self) -> usize {
        let guard = self.objects.lock().await;
        guard.len()
    }
}

#[derive(Default)]
pub struct FakeLlm {
    calls: AtomicUsize,
    prompts: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl LlmClient for FakeLlm {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        Ok(LLM_ISSUES.to_string())
    }
}

impl FakeLlm {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code)]
    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().ok().and_then(|prompts| prompts.last().cloned())
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    sent: std::sync::Mutex<Vec<EmailMessage>>,
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        self.sent
            .lock()
            .map_err(|_| EmailError::Transport("mailer poisoned".into()))?
            .push(message.clone());
        Ok(())
    }
}

impl RecordingMailer {
    #[allow(dead_code)]
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

/// In-memory Drive holding one folder's worth of plain-text files.
#[derive(Default)]
pub struct FakeDrive {
    folders: std::sync::Mutex<HashMap<String, DriveFolderMeta>>,
    files: std::sync::Mutex<Vec<(DriveFileMeta, String)>>,
}

impl FakeDrive {
    #[allow(dead_code)]
    pub fn add_folder(&self, id: &str, name: &str) {
        if let Ok(mut folders) = self.folders.lock() {
            folders.insert(
                id.to_string(),
                DriveFolderMeta {
                    id: id.to_string(),
                    name: name.to_string(),
                    web_view_link: Some(format!("https://drive.test/{id}")),
                    shared: false,
                },
            );
        }
    }

    #[allow(dead_code)]
    pub fn add_file(&self, id: &str, name: &str, mime_type: &str, content: &str) {
        let meta = DriveFileMeta {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            size: Some(content.len() as i64),
            modified_time: Some(chrono::Utc::now()),
            web_view_link: Some(format!("https://drive.test/file/{id}")),
        };
        if let Ok(mut files) = self.files.lock() {
            files.push((meta, content.to_string()));
        }
    }

    fn file(&self, file_id: &str) -> Result<(DriveFileMeta, String), DriveError> {
        let files = self
            .files
            .lock()
            .map_err(|_| DriveError::Transport("drive poisoned".into()))?;
        files
            .iter()
            .find(|(meta, _)| meta.id == file_id)
            .cloned()
            .ok_or_else(|| DriveError::NotFound(file_id.to_string()))
    }
}

#[async_trait]
impl DriveApi for FakeDrive {
    async fn folder_metadata(
        &self,
        _access_token: &str,
        folder_id: &str,
    ) -> Result<DriveFolderMeta, DriveError> {
        let folders = self
            .folders
            .lock()
            .map_err(|_| DriveError::Transport("drive poisoned".into()))?;
        folders
            .get(folder_id)
            .cloned()
            .ok_or_else(|| DriveError::NotFound(folder_id.to_string()))
    }

    async fn list_folder_files(
        &self,
        access_token: &str,
        _folder_id: &str,
    ) -> Result<Vec<DriveFileMeta>, DriveError> {
        if access_token == "expired" {
            return Err(DriveError::AuthExpired);
        }
        let files = self
            .files
            .lock()
            .map_err(|_| DriveError::Transport("drive poisoned".into()))?;
        Ok(files.iter().map(|(meta, _)| meta.clone()).collect())
    }

    async fn file_metadata(
        &self,
        _access_token: &str,
        file_id: &str,
    ) -> Result<DriveFileMeta, DriveError> {
        self.file(file_id).map(|(meta, _)| meta)
    }

    async fn download(&self, _access_token: &str, file_id: &str) -> Result<Vec<u8>, DriveError> {
        self.file(file_id).map(|(_, content)| content.into_bytes())
    }

    async fn export(
        &self,
        _access_token: &str,
        file_id: &str,
        _mime_type: &str,
    ) -> Result<String, DriveError> {
        self.file(file_id).map(|(_, content)| content)
    }
}

/// Accepts [`GOOD_CODE`] and rejects everything else the way Google does.
pub struct FakeOAuth;

#[async_trait]
impl OAuthClient for FakeOAuth {
    async fn exchange_code(
        &self,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<TokenResponse, OAuthError> {
        if code != GOOD_CODE {
            return Err(OAuthError::TokenExchange("invalid_grant".into()));
        }
        Ok(TokenResponse {
            access_token: "access-1".into(),
            refresh_token: Some("refresh-1".into()),
            expires_in: 3600,
            token_type: "Bearer".into(),
            scope: "drive".into(),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenResponse, OAuthError> {
        Ok(TokenResponse {
            access_token: "access-refreshed".into(),
            refresh_token: None,
            expires_in: 3600,
            token_type: "Bearer".into(),
            scope: "drive".into(),
        })
    }
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
    storage: Arc<FakeStorage>,
    llm: Arc<FakeLlm>,
    mailer: Arc<RecordingMailer>,
    drive: Arc<FakeDrive>,
    jwt: JwtAuthProvider,
}

pub fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        cors_allowed_origin: None,
        aws_endpoint_url: None,
        aws_access_key_id: None,
        aws_secret_access_key: None,
        aws_region: "us-east-1".to_string(),
        s3_bucket: "test-bucket".to_string(),
        supabase_url: None,
        supabase_anon_key: None,
        supabase_service_role_key: None,
        supabase_jwt_secret: Some(JWT_SECRET.to_string()),
        admin_email_domain: ADMIN_DOMAIN.to_string(),
        google_client_id: Some("client-id-1234567890".to_string()),
        google_client_secret: Some("client-secret".to_string()),
        google_redirect_uri: Some("http://localhost:3000/api/google/oauth/callback".to_string()),
        oauth_cookie_secure: false,
        anthropic_api_key: Some("test-key".to_string()),
        anthropic_model: "test-model".to_string(),
        sendgrid_api_key: Some("test-key".to_string()),
        sendgrid_from_email: "noreply@brand.test".to_string(),
        sendgrid_from_name: "Brand Guard".to_string(),
        app_url: "http://localhost:3000".to_string(),
        parse_timeout_seconds: 30,
    }
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;
        let mut config = test_config(database_url);
        adjust(&mut config);

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = Arc::new(FakeStorage::default());
        let llm = Arc::new(FakeLlm::default());
        let mailer = Arc::new(RecordingMailer::default());
        let drive = Arc::new(FakeDrive::default());
        let jwt = JwtAuthProvider::new(JWT_SECRET);

        let integrations = Integrations {
            storage: storage.clone(),
            auth: Arc::new(jwt.clone()),
            drive: drive.clone(),
            oauth: Arc::new(FakeOAuth),
            llm: llm.clone(),
            mailer: mailer.clone(),
        };
        let state = AppState::new(pool, config, integrations);
        let router = routes::create_router(state.clone());

        Ok(Self {
            state,
            router,
            storage,
            llm,
            mailer,
            drive,
            jwt,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(|conn| truncate_all(conn)).await
    }

    #[allow(dead_code)]
    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    #[allow(dead_code)]
    pub fn llm(&self) -> Arc<FakeLlm> {
        self.llm.clone()
    }

    #[allow(dead_code)]
    pub fn mailer(&self) -> Arc<RecordingMailer> {
        self.mailer.clone()
    }

    #[allow(dead_code)]
    pub fn drive(&self) -> Arc<FakeDrive> {
        self.drive.clone()
    }

    /// A session token for a new identity; the user row is created on first request.
    pub fn token_for(&self, email: &str) -> Result<(Uuid, String)> {
        let user_id = Uuid::new_v4();
        let token = self
            .jwt
            .issue_token(user_id, email, chrono::Duration::hours(1))
            .context("failed to sign test token")?;
        Ok((user_id, token))
    }

    /// Signs in once so the application user exists, returning its id and token.
    pub async fn sign_in(&self, email: &str) -> Result<(Uuid, String)> {
        let (_, token) = self.token_for(email)?;
        let response = self.get("/api/user/email-preferences", Some(&token)).await?;
        ensure!(
            response.status() == StatusCode::OK,
            "sign in failed with status {}",
            response.status()
        );
        let email = email.to_string();
        let user_id = self
            .with_conn(move |conn| {
                brand_guard::repo::users::find_by_email(conn, &email)?
                    .map(|user| user.id)
                    .ok_or_else(|| anyhow!("user {email} was not created"))
            })
            .await?;
        Ok((user_id, token))
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        json: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let body = match json {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json)?)
            }
            None => Body::empty(),
        };
        let request = builder.body(body)?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    /// Sends `body` as-is under the given content type.
    #[allow(dead_code)]
    pub async fn send_raw(
        &self,
        method: Method,
        path: &str,
        token: &str,
        content_type: &str,
        body: &str,
    ) -> Result<hyper::Response<Body>> {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", content_type)
            .body(Body::from(body.to_string()))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send(Method::GET, path, token, None, &[]).await
    }

    #[allow(dead_code)]
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let json = serde_json::to_value(payload)?;
        self.send(Method::POST, path, token, Some(json), &[]).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let json = serde_json::to_value(payload)?;
        self.send(Method::PATCH, path, token, Some(json), &[]).await
    }

    /// Posts files to the upload endpoint as multipart `files` parts.
    #[allow(dead_code)]
    pub async fn upload(
        &self,
        files: &[(&str, &str, &[u8])],
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        self.upload_field("files", files, token).await
    }

    #[allow(dead_code)]
    pub async fn upload_field(
        &self,
        field: &str,
        files: &[(&str, &str, &[u8])],
        token: &str,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();
        for (filename, content_type, data) in files {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!(
                    "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
                )
                .as_bytes(),
            );
            body.extend(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
            body.extend(*data);
            body.extend(b"\r\n");
        }
        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/user/upload/process")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    /// Uploads one text file and returns its id.
    #[allow(dead_code)]
    pub async fn upload_text(&self, filename: &str, text: &str, token: &str) -> Result<Uuid> {
        let response = self
            .upload(&[(filename, "text/plain", text.as_bytes())], token)
            .await?;
        ensure!(
            response.status() == StatusCode::OK,
            "upload failed with status {}",
            response.status()
        );
        let body = body_json(response).await?;
        let id = body["results"][0]["fileId"]
            .as_str()
            .ok_or_else(|| anyhow!("upload returned no file id: {body}"))?;
        Ok(Uuid::parse_str(id)?)
    }

    pub async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.state.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn body_json(response: hyper::Response<Body>) -> Result<Value> {
    let bytes = body_to_vec(response.into_body()).await?;
    serde_json::from_slice(&bytes).context("response body is not JSON")
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        conn.run_pending_migrations(db::MIGRATIONS)
            .map_err(|err| anyhow!("failed to run migrations: {err}"))?;
        truncate_all(&mut conn)?;
        Ok(())
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute(
        "TRUNCATE TABLE analysis_issues, brand_analysis_results, brand_rules_cache, drive_files, \
         drive_folders, drive_tokens, file_processing_results, uploaded_files, users \
         RESTART IDENTITY CASCADE;",
    )
    .context("failed to truncate tables")?;
    Ok(())
}
