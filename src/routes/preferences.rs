use axum::extract::{Json, State};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::error::{AppError, AppResult};
use crate::repo;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailPreferences {
    pub email_notifications: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailPreferencesUpdated {
    pub message: &'static str,
    pub email_notifications: bool,
}

pub async fn get_email_preferences(user: AuthenticatedUser) -> Json<EmailPreferences> {
    Json(EmailPreferences {
        email_notifications: user.email_notifications,
    })
}

pub async fn update_email_preferences(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<Value>,
) -> AppResult<Json<EmailPreferencesUpdated>> {
    let enabled = payload
        .get("emailNotifications")
        .and_then(Value::as_bool)
        .ok_or_else(|| AppError::bad_request("emailNotifications must be a boolean"))?;

    let mut conn = state.db()?;
    let updated = repo::users::set_email_notifications(&mut conn, user.id, enabled)?;
    info!(user_id = %updated.id, enabled, "email preferences updated");

    Ok(Json(EmailPreferencesUpdated {
        message: "Email preferences updated successfully",
        email_notifications: updated.email_notifications,
    }))
}
