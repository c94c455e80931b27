use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

pub const DEFAULT_ADMIN_EMAIL_DOMAIN: &str = "@danielbrian.com";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_APP_URL: &str = "http://localhost:3000";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub cors_allowed_origin: Option<String>,
    pub aws_endpoint_url: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub aws_region: String,
    pub s3_bucket: String,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub supabase_service_role_key: Option<String>,
    pub supabase_jwt_secret: Option<String>,
    pub admin_email_domain: String,
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_redirect_uri: Option<String>,
    pub oauth_cookie_secure: bool,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_from_email: String,
    pub sendgrid_from_name: String,
    pub app_url: String,
    pub parse_timeout_seconds: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();
        let aws_endpoint_url = env::var("AWS_ENDPOINT_URL").ok();
        let aws_access_key_id = env::var("AWS_ACCESS_KEY_ID").ok();
        let aws_secret_access_key = env::var("AWS_SECRET_ACCESS_KEY").ok();
        let aws_region = env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string());
        let s3_bucket = env::var("S3_BUCKET").context("S3_BUCKET must be set")?;

        let supabase_url = non_empty_var("NEXT_PUBLIC_SUPABASE_URL");
        let supabase_anon_key = non_empty_var("NEXT_PUBLIC_SUPABASE_ANON_KEY");
        let supabase_service_role_key = non_empty_var("SUPABASE_SERVICE_ROLE_KEY");
        let supabase_jwt_secret = non_empty_var("SUPABASE_JWT_SECRET");
        if supabase_url.is_none() && supabase_jwt_secret.is_none() {
            anyhow::bail!("NEXT_PUBLIC_SUPABASE_URL or SUPABASE_JWT_SECRET must be set");
        }
        let admin_email_domain = env::var("ADMIN_EMAIL_DOMAIN")
            .unwrap_or_else(|_| DEFAULT_ADMIN_EMAIL_DOMAIN.to_string());

        let google_client_id = non_empty_var("GOOGLE_CLIENT_ID");
        let google_client_secret = non_empty_var("GOOGLE_CLIENT_SECRET");
        let google_redirect_uri = non_empty_var("GOOGLE_REDIRECT_URI");
        let oauth_cookie_secure = env::var("OAUTH_COOKIE_SECURE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let anthropic_api_key = non_empty_var("ANTHROPIC_API_KEY");
        let anthropic_model =
            env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_ANTHROPIC_MODEL.to_string());

        let sendgrid_api_key = non_empty_var("SENDGRID_API_KEY");
        let sendgrid_from_email = env::var("SENDGRID_FROM_EMAIL")
            .unwrap_or_else(|_| "noreply@brandguard.local".to_string());
        let sendgrid_from_name =
            env::var("SENDGRID_FROM_NAME").unwrap_or_else(|_| "Brand Guard".to_string());

        let app_url = env::var("NEXT_PUBLIC_APP_URL")
            .map(|value| value.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| DEFAULT_APP_URL.to_string());
        let parse_timeout_seconds = env::var("PARSE_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("PARSE_TIMEOUT_SECONDS must be an integer")?;

        Ok(Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            cors_allowed_origin,
            aws_endpoint_url,
            aws_access_key_id,
            aws_secret_access_key,
            aws_region,
            s3_bucket,
            supabase_url,
            supabase_anon_key,
            supabase_service_role_key,
            supabase_jwt_secret,
            admin_email_domain,
            google_client_id,
            google_client_secret,
            google_redirect_uri,
            oauth_cookie_secure,
            anthropic_api_key,
            anthropic_model,
            sendgrid_api_key,
            sendgrid_from_email,
            sendgrid_from_name,
            app_url,
            parse_timeout_seconds,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }

    pub fn parse_timeout(&self) -> Duration {
        Duration::from_secs(self.parse_timeout_seconds.max(1))
    }

    /// Key sent as `apikey` to the hosted auth provider.
    pub fn supabase_api_key(&self) -> Option<&str> {
        self.supabase_anon_key
            .as_deref()
            .or(self.supabase_service_role_key.as_deref())
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        !self.admin_email_domain.is_empty()
            && email
                .to_ascii_lowercase()
                .ends_with(&self.admin_email_domain.to_ascii_lowercase())
    }

    pub fn expected_redirect_uri(&self) -> String {
        format!("{}/api/google/oauth/callback", self.app_url)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            let _ = parsed.set_password(Some("*****"));
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/brand_guard".into(),
        database_max_pool_size: 1,
        server_host: "127.0.0.1".into(),
        server_port: 3000,
        cors_allowed_origin: None,
        aws_endpoint_url: None,
        aws_access_key_id: None,
        aws_secret_access_key: None,
        aws_region: "us-east-1".into(),
        s3_bucket: "uploads".into(),
        supabase_url: None,
        supabase_anon_key: None,
        supabase_service_role_key: None,
        supabase_jwt_secret: Some("secret".into()),
        admin_email_domain: DEFAULT_ADMIN_EMAIL_DOMAIN.into(),
        google_client_id: None,
        google_client_secret: None,
        google_redirect_uri: None,
        oauth_cookie_secure: false,
        anthropic_api_key: None,
        anthropic_model: DEFAULT_ANTHROPIC_MODEL.into(),
        sendgrid_api_key: None,
        sendgrid_from_email: "noreply@example.com".into(),
        sendgrid_from_name: "Brand Guard".into(),
        app_url: DEFAULT_APP_URL.into(),
        parse_timeout_seconds: 30,
    }
}
