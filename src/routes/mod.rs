use axum::http::HeaderValue;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::{auth::AuthenticatedUser, state::AppState};

pub mod admin;
pub mod analysis;
pub mod drive;
pub mod files;
pub mod health;
pub mod oauth;
pub mod preferences;

const MAX_BODY_BYTES: usize = 1024 * 1024 * 100;

/// A row id from the request. Anything that is not a uuid names no row.
pub(crate) fn parse_id(raw: &str, not_found: &'static str) -> AppResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::not_found(not_found))
}

fn cors_layer(allowed: Option<&str>) -> CorsLayer {
    let allow_origin = match allowed {
        Some(origins) => {
            let headers: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .filter_map(|value| match value.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(_) => {
                        warn!(origin = value, "ignoring invalid CORS allowed origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(headers)
        }
        None => AllowOrigin::mirror_request(),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

pub fn create_router(state: AppState) -> Router<()> {
    let cors = cors_layer(state.config.cors_allowed_origin.as_deref());

    let user_routes = Router::new()
        .route("/upload/process", post(files::process_uploads))
        .route("/files", get(files::list_files))
        .route("/files/:id", get(files::get_file))
        .route("/files/:id/analyze", post(analysis::analyze_file))
        .route("/analysis", get(analysis::list_analyses))
        .route(
            "/analysis/:id/issues",
            get(analysis::list_issues).patch(analysis::update_issue_status),
        )
        .route(
            "/email-preferences",
            get(preferences::get_email_preferences)
                .patch(preferences::update_email_preferences),
        );

    let admin_routes = Router::new()
        .route(
            "/users",
            get(admin::list_users).patch(admin::update_user_role),
        )
        .route("/brand-rules", get(admin::brand_rules))
        .route("/dashboard", get(admin::dashboard))
        .route("/files", get(admin::list_files))
        .route("/test-email", post(admin::send_test_email));

    let drive_routes = Router::new()
        .route(
            "/folders",
            get(drive::list_folders).post(drive::register_folder),
        )
        .route("/activate", post(drive::activate_folder))
        .route("/deactivate", post(drive::deactivate_folders))
        .route("/brand-files", get(drive::brand_files))
        .route("/sync", post(drive::sync_folder))
        .route("/diagnostic", get(drive::diagnostic))
        .route("/auth", get(drive::auth_url));

    let protected_state = state.clone();
    let protected_routes = Router::new()
        .nest("/api/user", user_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/drive", drive_routes)
        .layer(middleware::from_extractor_with_state::<AuthenticatedUser, _>(protected_state));

    let oauth_routes = Router::new()
        .route("/start", get(oauth::start))
        .route("/callback", get(oauth::callback))
        .route("/config", get(oauth::config));

    Router::new()
        .merge(protected_routes)
        .nest("/api/google/oauth", oauth_routes)
        .route("/api/drive/callback", get(oauth::callback))
        .route("/api/health", get(health::health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}
