use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use super::{AuthError, AuthProvider, ProviderUser};

/// Resolves session tokens against the hosted auth provider's user endpoint.
pub struct SupabaseAuthProvider {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct SupabaseUser {
    id: Uuid,
    email: Option<String>,
}

impl SupabaseAuthProvider {
    pub fn new(http: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuthProvider {
    async fn verify(&self, token: &str) -> Result<ProviderUser, AuthError> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| AuthError::Upstream(err.to_string()))?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(AuthError::Rejected("session rejected".into()));
            }
            status => {
                return Err(AuthError::Upstream(format!(
                    "auth provider responded with {status}"
                )));
            }
        }

        let user: SupabaseUser = response
            .json()
            .await
            .map_err(|err| AuthError::Upstream(err.to_string()))?;
        let email = user
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AuthError::Rejected("user has no email".into()))?;

        Ok(ProviderUser { id: user.id, email })
    }
}
