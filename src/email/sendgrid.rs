use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use super::{EmailError, EmailMessage, EmailSender};

const SENDGRID_API_BASE: &str = "https://api.sendgrid.com";

pub struct SendGridSender {
    http: Client,
    api_key: Option<String>,
    base_url: String,
}

impl SendGridSender {
    pub fn new(http: Client, api_key: Option<String>) -> Self {
        Self::with_base_url(http, api_key, SENDGRID_API_BASE)
    }

    pub fn with_base_url(http: Client, api_key: Option<String>, base_url: &str) -> Self {
        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

fn payload(message: &EmailMessage) -> serde_json::Value {
    json!({
        "personalizations": [{ "to": [{ "email": message.to }] }],
        "from": { "email": message.from_email, "name": message.from_name },
        "subject": message.subject,
        "content": [
            { "type": "text/plain", "value": message.text },
            { "type": "text/html", "value": message.html },
        ],
    })
}

#[async_trait]
impl EmailSender for SendGridSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        let api_key = self.api_key.as_deref().ok_or(EmailError::NotConfigured)?;
        let response = self
            .http
            .post(format!("{}/v3/mail/send", self.base_url))
            .bearer_auth(api_key)
            .json(&payload(message))
            .send()
            .await
            .map_err(|err| EmailError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, "sendgrid rejected message");
            return Err(EmailError::Rejected {
                status: status.as_u16(),
                message: body.chars().take(500).collect(),
            });
        }
        Ok(())
    }
}
