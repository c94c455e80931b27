//! Google OAuth for Drive access: consent URL, CSRF state, and token upkeep.

pub mod google;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::db::PgPool;
use crate::models::PROVIDER_GOOGLE;
use crate::repo;

pub use google::GoogleOAuthClient;

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const STATE_COOKIE: &str = "oauth_state";
pub const STATE_COOKIE_MAX_AGE: u32 = 600;
pub const DRIVE_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/drive.readonly",
    "https://www.googleapis.com/auth/drive.file",
];

#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("Google OAuth client is not configured")]
    NotConfigured,
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),
    #[error("OAuth request failed: {0}")]
    Transport(String),
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

#[async_trait]
pub trait OAuthClient: Send + Sync + 'static {
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, OAuthError>;

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, OAuthError>;
}

pub fn build_auth_url(client_id: &str, redirect_uri: &str, scopes: &[&str], state: &str) -> String {
    let scope = scopes.join(" ");
    let params = [
        ("client_id", client_id),
        ("redirect_uri", redirect_uri),
        ("response_type", "code"),
        ("scope", scope.as_str()),
        ("access_type", "offline"),
        ("prompt", "consent"),
        ("state", state),
    ];
    match Url::parse_with_params(GOOGLE_AUTH_URL, &params) {
        Ok(url) => url.into(),
        Err(_) => GOOGLE_AUTH_URL.to_string(),
    }
}

/// 32 bytes from the OS RNG, hex encoded.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn state_cookie(state: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{STATE_COOKIE}={state}; Path=/; HttpOnly; SameSite=Lax; Max-Age={STATE_COOKIE_MAX_AGE}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_state_cookie(secure: bool) -> String {
    let mut cookie = format!("{STATE_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn calculate_expires_at(expires_in: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(expires_in)
}

/// The user's Google access token, refreshed first when it has expired.
///
/// Returns `None` when the user never connected Drive. An expired token with
/// no refresh token is returned unchanged and left for Drive to reject.
pub async fn valid_access_token(
    pool: &PgPool,
    oauth: &dyn OAuthClient,
    user_id: Uuid,
) -> Result<Option<String>, OAuthError> {
    let stored = {
        let mut conn = pool.get()?;
        repo::drive::get_tokens(&mut conn, user_id, PROVIDER_GOOGLE)?
    };
    let Some(token) = stored else {
        return Ok(None);
    };

    if !token.is_expired(Utc::now()) {
        return Ok(Some(token.access_token));
    }
    let Some(refresh_token) = token.refresh_token.as_deref() else {
        debug!(%user_id, "drive token expired without refresh token");
        return Ok(Some(token.access_token));
    };

    let refreshed = oauth.refresh(refresh_token).await?;
    let expires_at = calculate_expires_at(refreshed.expires_in);
    let mut conn = pool.get()?;
    repo::drive::update_access_token(&mut conn, token.id, &refreshed.access_token, Some(expires_at))?;
    info!(%user_id, "refreshed drive access token");

    Ok(Some(refreshed.access_token))
}
