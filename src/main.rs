use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;

use brand_guard::{
    analysis::AnthropicClient,
    auth::{jwt::JwtAuthProvider, supabase::SupabaseAuthProvider, AuthProvider},
    config::AppConfig,
    create_router, db,
    drive::GoogleDriveClient,
    email::sendgrid::SendGridSender,
    oauth::GoogleOAuthClient,
    storage::S3Storage,
    AppState, Integrations,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "server",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        s3_bucket = %config.s3_bucket,
        google_configured = config.google_client_id.is_some(),
        anthropic_configured = config.anthropic_api_key.is_some(),
        sendgrid_configured = config.sendgrid_api_key.is_some(),
        "loaded backend configuration"
    );

    let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
    let applied = db::run_migrations(&pool)?;
    tracing::info!(applied, "database migrations complete");

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;
    let storage = Arc::new(S3Storage::from_config(&config).await?);
    let auth = auth_provider(&config, http.clone())?;

    let integrations = Integrations {
        storage,
        auth,
        drive: Arc::new(GoogleDriveClient::new(http.clone())),
        oauth: Arc::new(GoogleOAuthClient::new(
            http.clone(),
            config.google_client_id.clone(),
            config.google_client_secret.clone(),
        )),
        llm: Arc::new(AnthropicClient::new(
            http.clone(),
            config.anthropic_api_key.clone(),
            config.anthropic_model.clone(),
        )),
        mailer: Arc::new(SendGridSender::new(http, config.sendgrid_api_key.clone())),
    };

    let addr = format!("{}:{}", config.server_host, config.server_port);
    let state = AppState::new(pool, config, integrations);
    let app = create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            signal::ctrl_c().await.ok();
            tracing::info!("server received shutdown signal");
        })
        .await?;

    Ok(())
}

/// Local HS256 verification when the signing secret is known, else the hosted
/// user endpoint.
fn auth_provider(config: &AppConfig, http: reqwest::Client) -> anyhow::Result<Arc<dyn AuthProvider>> {
    if let Some(secret) = config.supabase_jwt_secret.as_deref() {
        tracing::info!(provider = "jwt", "session verification configured");
        return Ok(Arc::new(JwtAuthProvider::new(secret)));
    }
    match (config.supabase_url.as_deref(), config.supabase_api_key()) {
        (Some(url), Some(key)) => {
            tracing::info!(provider = "supabase", "session verification configured");
            Ok(Arc::new(SupabaseAuthProvider::new(http, url, key)))
        }
        _ => bail!("set SUPABASE_JWT_SECRET or SUPABASE_URL with an API key"),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
