use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::{OAuthClient, OAuthError, TokenResponse};

const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

pub struct GoogleOAuthClient {
    http: Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    token_url: String,
}

impl GoogleOAuthClient {
    pub fn new(http: Client, client_id: Option<String>, client_secret: Option<String>) -> Self {
        Self::with_token_url(http, client_id, client_secret, GOOGLE_TOKEN_URL)
    }

    pub fn with_token_url(
        http: Client,
        client_id: Option<String>,
        client_secret: Option<String>,
        token_url: &str,
    ) -> Self {
        Self {
            http,
            client_id,
            client_secret,
            token_url: token_url.to_string(),
        }
    }

    fn credentials(&self) -> Result<(&str, &str), OAuthError> {
        match (self.client_id.as_deref(), self.client_secret.as_deref()) {
            (Some(id), Some(secret)) => Ok((id, secret)),
            _ => Err(OAuthError::NotConfigured),
        }
    }

    async fn post_form(&self, form: &[(&str, &str)]) -> Result<TokenResponse, OAuthError> {
        let response = self
            .http
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(|err| OAuthError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| OAuthError::Transport(err.to_string()))?;

        if !status.is_success() {
            debug!(%status, "google token endpoint rejected request");
            return Err(OAuthError::TokenExchange(error_code(&body)));
        }

        serde_json::from_str(&body).map_err(|err| OAuthError::TokenExchange(err.to_string()))
    }
}

/// Google's `error` field, or a short description of an unreadable body.
fn error_code(body: &str) -> String {
    if body.trim().is_empty() {
        return "Empty response".to_string();
    }
    match serde_json::from_str::<Value>(body) {
        Ok(value) => value
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string(),
        Err(_) => "Invalid JSON".to_string(),
    }
}

#[async_trait]
impl OAuthClient for GoogleOAuthClient {
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, OAuthError> {
        let (client_id, client_secret) = self.credentials()?;
        self.post_form(&[
            ("code", code),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, OAuthError> {
        let (client_id, client_secret) = self.credentials()?;
        self.post_form(&[
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("grant_type", "refresh_token"),
        ])
        .await
    }
}
