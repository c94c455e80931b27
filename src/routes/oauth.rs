use axum::extract::{Json, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::headers::Cookie;
use axum_extra::TypedHeader;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};
use url::Url;

use crate::auth::resolve_user;
use crate::error::{AppError, AppResult};
use crate::models::PROVIDER_GOOGLE;
use crate::oauth::{self, OAuthError, DRIVE_SCOPES, STATE_COOKIE};
use crate::repo;
use crate::state::AppState;

const SESSION_COOKIE: &str = "supabase-auth-token";
const NOT_SET: &str = "NOT_SET";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub ok: bool,
    pub url: String,
    pub state: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigView {
    pub client_id: String,
    pub redirect_uri: String,
    pub has_client_secret: bool,
    pub app_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    pub message: &'static str,
    pub config: ConfigView,
    pub expected_redirect_uri: String,
}

fn config_missing() -> AppError {
    AppError::oauth(
        StatusCode::INTERNAL_SERVER_ERROR,
        "OAUTH_CONFIG_MISSING",
        "Google OAuth not properly configured",
    )
    .with_diagnostic("SERVER_CONFIG")
}

/// `{app_url}/settings/drive` with the given query pairs.
fn settings_redirect(app_url: &str, params: &[(&str, &str)]) -> String {
    let base = format!("{}/settings/drive", app_url.trim_end_matches('/'));
    match Url::parse(&base) {
        Ok(mut url) => {
            url.query_pairs_mut().extend_pairs(params);
            url.into()
        }
        Err(_) => base,
    }
}

fn redacted_client_id(client_id: Option<&str>) -> String {
    match client_id {
        Some(id) => format!("{}...", id.chars().take(12).collect::<String>()),
        None => NOT_SET.to_string(),
    }
}

fn session_token(cookies: Option<&Cookie>, headers: &HeaderMap) -> Option<String> {
    if let Some(token) = cookies.and_then(|cookies| cookies.get(SESSION_COOKIE)) {
        return Some(token.to_string());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim_start_matches("Bearer ").trim().to_string())
        .filter(|token| !token.is_empty())
}

pub async fn start(State(state): State<AppState>) -> AppResult<Response> {
    let config = &state.config;
    let (Some(client_id), Some(redirect_uri)) = (
        config.google_client_id.as_deref(),
        config.google_redirect_uri.as_deref(),
    ) else {
        return Err(config_missing().with_details(json!({
            "hasClientId": config.google_client_id.is_some(),
            "hasRedirectUri": config.google_redirect_uri.is_some(),
        })));
    };

    let state_token = oauth::generate_state();
    let url = oauth::build_auth_url(client_id, redirect_uri, &DRIVE_SCOPES, &state_token);
    let preview: String = state_token.chars().take(8).collect();
    info!("starting google oauth flow");

    Ok((
        [(
            header::SET_COOKIE,
            oauth::state_cookie(&state_token, config.oauth_cookie_secure),
        )],
        Json(StartResponse {
            ok: true,
            url,
            state: format!("{preview}..."),
        }),
    )
        .into_response())
}

pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
    cookies: Option<TypedHeader<Cookie>>,
    headers: HeaderMap,
) -> AppResult<Response> {
    let config = &state.config;
    if let Some(denied) = query.error.as_deref() {
        warn!(error = denied, "google oauth denied");
        let message = format!("Google OAuth error: {denied}");
        let target = settings_redirect(
            &config.app_url,
            &[("error", "oauth_denied"), ("message", &message)],
        );
        return Ok(Redirect::to(&target).into_response());
    }

    let Some(code) = query.code.as_deref().filter(|code| !code.is_empty()) else {
        return Err(AppError::oauth(
            StatusCode::BAD_REQUEST,
            "MISSING_CODE",
            "Authorization code not provided",
        )
        .with_diagnostic("OAUTH_FLOW_ERROR"));
    };
    let Some(returned_state) = query.state.as_deref().filter(|s| !s.is_empty()) else {
        return Err(AppError::oauth(
            StatusCode::BAD_REQUEST,
            "MISSING_STATE",
            "State parameter not provided",
        )
        .with_diagnostic("OAUTH_FLOW_ERROR"));
    };

    let cookies = cookies.map(|TypedHeader(cookies)| cookies);
    let stored_state = cookies.as_ref().and_then(|cookies| cookies.get(STATE_COOKIE));
    if stored_state != Some(returned_state) {
        warn!("oauth state mismatch");
        return Err(AppError::oauth(
            StatusCode::BAD_REQUEST,
            "OAUTH_STATE_MISMATCH",
            "Invalid state parameter - possible CSRF attack",
        )
        .with_diagnostic("SECURITY_ERROR"));
    }

    let (Some(_), Some(_), Some(redirect_uri)) = (
        config.google_client_id.as_deref(),
        config.google_client_secret.as_deref(),
        config.google_redirect_uri.as_deref(),
    ) else {
        return Err(config_missing());
    };

    let tokens = match state.oauth.exchange_code(code, redirect_uri).await {
        Ok(tokens) => tokens,
        Err(OAuthError::TokenExchange(message)) => {
            error!(error = %message, "google token exchange failed");
            return Err(AppError::oauth(
                StatusCode::BAD_REQUEST,
                "TOKEN_EXCHANGE_FAILED",
                "Failed to exchange authorization code for tokens",
            )
            .with_diagnostic("GOOGLE_API_ERROR")
            .with_details(format!("Token exchange failed: {message}")));
        }
        Err(other) => return Err(callback_error(other.to_string())),
    };
    let expires_at = oauth::calculate_expires_at(tokens.expires_in);

    let Some(session) = session_token(cookies.as_ref(), &headers) else {
        let target = settings_redirect(
            &config.app_url,
            &[("error", "session_required"), ("message", "Please sign in first")],
        );
        return Ok(Redirect::to(&target).into_response());
    };
    let identity = match state.auth.verify(&session).await {
        Ok(identity) => identity,
        Err(err) => {
            warn!(error = %err, "oauth callback session rejected");
            let target = settings_redirect(
                &config.app_url,
                &[("error", "invalid_session"), ("message", "Please sign in again")],
            );
            return Ok(Redirect::to(&target).into_response());
        }
    };

    let stored = state.db().and_then(|mut conn| {
        let user = resolve_user(&mut conn, config, &identity)?;
        let token = repo::drive::upsert_tokens(
            &mut conn,
            user.id,
            PROVIDER_GOOGLE,
            &tokens.access_token,
            tokens.refresh_token.as_deref(),
            Some(expires_at),
        )?;
        Ok((user, token))
    });
    let (user, _) = stored.map_err(|err| {
        error!(error = %err, "failed to save drive tokens");
        AppError::oauth(
            StatusCode::INTERNAL_SERVER_ERROR,
            "DB_ERROR",
            "Failed to save authentication tokens",
        )
        .with_diagnostic("DATABASE_ERROR")
        .with_details(err.message().to_string())
    })?;
    info!(
        user_id = %user.id,
        has_refresh_token = tokens.refresh_token.is_some(),
        "stored google drive tokens"
    );

    let target = settings_redirect(&config.app_url, &[("connected", "1")]);
    Ok((
        [(
            header::SET_COOKIE,
            oauth::clear_state_cookie(config.oauth_cookie_secure),
        )],
        Redirect::to(&target),
    )
        .into_response())
}

fn callback_error(details: String) -> AppError {
    error!(error = %details, "oauth callback failed");
    AppError::oauth(
        StatusCode::INTERNAL_SERVER_ERROR,
        "OAUTH_CALLBACK_ERROR",
        "Unexpected error during OAuth callback",
    )
    .with_diagnostic("INTERNAL_ERROR")
    .with_details(details)
}

pub async fn config(State(state): State<AppState>) -> Json<ConfigResponse> {
    let config = &state.config;
    Json(ConfigResponse {
        message: "Google OAuth Configuration",
        config: ConfigView {
            client_id: redacted_client_id(config.google_client_id.as_deref()),
            redirect_uri: config
                .google_redirect_uri
                .clone()
                .unwrap_or_else(|| NOT_SET.to_string()),
            has_client_secret: config.google_client_secret.is_some(),
            app_url: config.app_url.clone(),
        },
        expected_redirect_uri: config.expected_redirect_uri(),
    })
}
