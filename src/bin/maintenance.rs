use std::env;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use tracing_subscriber::EnvFilter;

use brand_guard::{
    config::AppConfig,
    db::{self, PgPool},
    models::STATUS_FAILED,
    repo,
    storage::{ObjectStorage, S3Storage},
};

const USAGE: &str = "Usage: maintenance <purge-rules-cache [days] | purge-orphan-objects>";
const DEFAULT_CACHE_DAYS: i64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let mut args = env::args().skip(1);
    match args.next().as_deref() {
        Some("purge-rules-cache") => {
            let days = match args.next() {
                Some(raw) => raw
                    .parse::<i64>()
                    .with_context(|| format!("invalid day count: {raw}"))?,
                None => DEFAULT_CACHE_DAYS,
            };
            purge_rules_cache(days)?;
        }
        Some("purge-orphan-objects") => purge_orphan_objects().await?,
        Some(cmd) => {
            eprintln!("Unknown command: {cmd}\n{USAGE}");
            std::process::exit(1);
        }
        None => {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn connect() -> Result<(AppConfig, PgPool)> {
    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        s3_bucket = %config.s3_bucket,
        "loaded backend configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    Ok((config, pool))
}

fn purge_rules_cache(days: i64) -> Result<()> {
    let (_, pool) = connect()?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let cutoff = Utc::now() - Duration::days(days.max(0));
    let removed = repo::rules_cache::purge_older_than(&mut conn, cutoff)
        .context("failed to purge rules cache")?;

    println!("Removed {removed} cached rule sets older than {days} days.");
    Ok(())
}

/// Deletes the stored objects of failed uploads. The rows stay for the file list.
async fn purge_orphan_objects() -> Result<()> {
    let (config, pool) = connect()?;
    let storage = S3Storage::from_config(&config).await?;

    let failed = {
        let mut conn = pool.get().context("failed to get database connection")?;
        repo::files::list_by_status(&mut conn, STATUS_FAILED)
            .context("failed to load failed uploads")?
    };

    if failed.is_empty() {
        println!("No failed uploads found.");
        return Ok(());
    }

    println!("Deleting objects for {} failed uploads…", failed.len());

    let mut deleted = 0usize;
    for file in &failed {
        match storage.delete_object(&file.storage_path).await {
            Ok(()) => deleted += 1,
            Err(err) => eprintln!(
                "Failed to delete object {} from storage: {err}",
                file.storage_path
            ),
        }
    }

    println!("Deleted {deleted} of {} objects.", failed.len());
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
