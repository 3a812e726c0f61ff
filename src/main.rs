use anyhow::{Context, Result};
use anidex::anilist::AniListClient;
use anidex::config::SyncConfig;
use anidex::store::StoreClient;
use anidex::sync::{SyncJob, SyncOptions};
use dotenvy::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    match dotenv() {
        Ok(path) => info!("Loaded environment from {:?}", path),
        Err(e) => warn!("No .env file loaded ({}) - relying on environment", e),
    }

    let config = SyncConfig::from_env()?;
    let source = AniListClient::with_endpoint(config.anilist_endpoint.clone())?;
    let store = StoreClient::new(&config.store).context("Failed to build store client")?;

    let mut job = SyncJob::new(&source, &store, SyncOptions::from(&config));
    let report = job.run().await;

    match report.error {
        Some(e) => Err(anyhow::Error::new(e).context(format!(
            "AniList sync failed after {} anime",
            report.total_synced
        ))),
        None => Ok(()),
    }
}
