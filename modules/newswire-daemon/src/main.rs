use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use newswire_common::{file_config, AppConfig};
use newswire_store::{PgStore, Store};

mod pipeline;

#[derive(Parser)]
#[command(name = "newswire", about = "RSS ingestion, dedup, and alerting pipeline")]
struct Cli {
    /// Path to the feeds TOML file.
    #[arg(long, default_value = "config/feeds.toml")]
    feeds: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("newswire=info".parse()?))
        .init();

    info!("newswire starting...");

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("configuration invalid")?;
    let feeds = file_config::load_feeds(&cli.feeds)?;
    info!(
        feeds = feeds.feeds.len(),
        interval_min = feeds.global.refresh_interval_minutes,
        "Feeds file loaded"
    );

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to Postgres")?;
    let pg = PgStore::new(pool);
    pg.migrate().await.context("migrations failed")?;
    let store: Arc<dyn Store> = Arc::new(pg);

    // Seed or update the feed table from the file; runtime counters are
    // preserved on conflict.
    for entry in feeds.feeds.clone() {
        store.upsert_feed(&entry.into_feed()).await?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pipeline_task = {
        let store = Arc::clone(&store);
        let config = config.clone();
        let feeds = feeds.clone();
        tokio::spawn(async move { pipeline::run(store, &config, &feeds, shutdown_rx).await })
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received, draining pipeline");
    let _ = shutdown_tx.send(true);

    pipeline_task.await??;
    info!("newswire stopped");
    Ok(())
}
