pub mod jwt;
pub mod supabase;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;
use diesel::PgConnection;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::{NewUser, User, ROLE_ADMIN, ROLE_USER};
use crate::repo;
use crate::{error::AppError, state::AppState};

/// Identity asserted by the auth provider for a bearer token.
#[derive(Debug, Clone)]
pub struct ProviderUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("token rejected: {0}")]
    Rejected(String),
    #[error("auth provider unavailable: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    async fn verify(&self, token: &str) -> Result<ProviderUser, AuthError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
    pub email_notifications: bool,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    /// Owners and admins may read or act on a user's resources.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.id == owner_id || self.is_admin()
    }
}

impl From<User> for AuthenticatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            email_notifications: user.email_notifications,
        }
    }
}

/// Looks the application user up by email, then by provider id, creating it
/// on first sight.
pub fn resolve_user(
    conn: &mut PgConnection,
    config: &AppConfig,
    identity: &ProviderUser,
) -> diesel::QueryResult<User> {
    if let Some(user) = repo::users::find_by_email(conn, &identity.email)? {
        return Ok(user);
    }
    if let Some(user) = repo::users::find_by_id(conn, identity.id)? {
        return Ok(user);
    }

    let role = if config.is_admin_email(&identity.email) {
        ROLE_ADMIN
    } else {
        ROLE_USER
    };
    let new_user = NewUser {
        id: identity.id,
        email: identity.email.clone(),
        role: role.to_string(),
    };

    match repo::users::insert(conn, &new_user) {
        Ok(user) => {
            info!(user_id = %user.id, role = %user.role, "created application user");
            Ok(user)
        }
        Err(diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            _,
        )) => match repo::users::find_by_email(conn, &identity.email)? {
            Some(user) => Ok(user),
            None => repo::users::find_by_id(conn, identity.id)?
                .ok_or(diesel::result::Error::NotFound),
        },
        Err(err) => Err(err),
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthenticatedUser>() {
            return Ok(user.clone());
        }

        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized("Unauthorized"))?;

        let identity = state.auth.verify(bearer.token()).await.map_err(|err| {
            if let AuthError::Upstream(_) = &err {
                warn!(error = %err, "auth provider call failed");
            }
            AppError::unauthorized("Invalid token")
        })?;

        let mut conn = state.db()?;
        let user: AuthenticatedUser = resolve_user(&mut conn, &state.config, &identity)?.into();
        parts.extensions.insert(user.clone());
        Ok(user)
    }
}

/// An authenticated user holding the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::forbidden("Admin access required"));
        }
        Ok(AdminUser(user))
    }
}
