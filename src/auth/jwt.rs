use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AuthError, AuthProvider, ProviderUser};

/// Verifies provider-issued HS256 session tokens locally.
#[derive(Clone)]
pub struct JwtAuthProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub exp: usize,
}

impl JwtAuthProvider {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Signs a session token in the same shape the hosted provider issues.
    pub fn issue_token(
        &self,
        user_id: Uuid,
        email: &str,
        ttl: chrono::Duration,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let claims = Claims {
            sub: user_id.to_string(),
            email: Some(email.to_string()),
            aud: Some("authenticated".to_string()),
            exp: (chrono::Utc::now() + ttl).timestamp() as usize,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    fn verify_claims(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        let data = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|err| AuthError::Rejected(err.to_string()))?;
        Ok(data.claims)
    }
}

#[async_trait]
impl AuthProvider for JwtAuthProvider {
    async fn verify(&self, token: &str) -> Result<ProviderUser, AuthError> {
        let claims = self.verify_claims(token)?;
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AuthError::Rejected("subject is not a uuid".into()))?;
        let email = claims
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AuthError::Rejected("token carries no email".into()))?;
        Ok(ProviderUser { id, email })
    }
}
