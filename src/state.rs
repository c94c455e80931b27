use std::sync::Arc;

use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, PooledConnection},
};

use crate::{
    analysis::{AnalysisService, LlmClient},
    auth::AuthProvider,
    config::AppConfig,
    db::PgPool,
    drive::DriveApi,
    email::{EmailSender, Notifier},
    error::{AppError, AppResult},
    oauth::OAuthClient,
    storage::ObjectStorage,
};

type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// External services the handlers talk to.
pub struct Integrations {
    pub storage: Arc<dyn ObjectStorage>,
    pub auth: Arc<dyn AuthProvider>,
    pub drive: Arc<dyn DriveApi>,
    pub oauth: Arc<dyn OAuthClient>,
    pub llm: Arc<dyn LlmClient>,
    pub mailer: Arc<dyn EmailSender>,
}

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn ObjectStorage>,
    pub auth: Arc<dyn AuthProvider>,
    pub drive: Arc<dyn DriveApi>,
    pub oauth: Arc<dyn OAuthClient>,
    pub analysis: Arc<AnalysisService>,
    pub notifier: Arc<Notifier>,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig, integrations: Integrations) -> Self {
        let notifier = Notifier::new(
            integrations.mailer,
            config.sendgrid_from_email.clone(),
            config.sendgrid_from_name.clone(),
        );
        Self {
            pool,
            config: Arc::new(config),
            storage: integrations.storage,
            auth: integrations.auth,
            drive: integrations.drive,
            oauth: integrations.oauth,
            analysis: Arc::new(AnalysisService::new(integrations.llm)),
            notifier: Arc::new(notifier),
        }
    }

    pub fn db(&self) -> AppResult<PgPooledConnection> {
        self.pool
            .get()
            .map_err(|err| AppError::internal(format!("database pool error: {err}")))
    }
}
